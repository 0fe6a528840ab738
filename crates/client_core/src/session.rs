use std::sync::Arc;

use shared::protocol::TokenPair;
use tokio::sync::RwLock;
use tracing::debug;
use zeroize::Zeroize;

/// Login session with an explicit lifecycle: created empty, populated by a
/// successful login, cleared by logout. Logout is purely local; no remote
/// call is made and token material is wiped.
///
/// Cloning yields another handle to the same session, so a transport and the
/// auth client can share one.
#[derive(Clone, Default)]
pub struct Session {
    tokens: Arc<RwLock<Option<TokenPair>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn install(&self, tokens: TokenPair) {
        let mut guard = self.tokens.write().await;
        if let Some(previous) = guard.take() {
            wipe(previous);
        }
        *guard = Some(tokens);
        debug!("session: tokens installed");
    }

    /// Logout. Local only; the server is never contacted.
    pub async fn clear(&self) {
        let mut guard = self.tokens.write().await;
        if let Some(previous) = guard.take() {
            wipe(previous);
            debug!("session: tokens cleared");
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.access.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.refresh.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }
}

fn wipe(mut tokens: TokenPair) {
    tokens.access.zeroize();
    tokens.refresh.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> TokenPair {
        TokenPair {
            access: "access-token".to_string(),
            refresh: "refresh-token".to_string(),
        }
    }

    #[tokio::test]
    async fn starts_unauthenticated() {
        let session = Session::new();
        assert!(!session.is_authenticated().await);
        assert_eq!(session.access_token().await, None);
    }

    #[tokio::test]
    async fn install_then_clear_round_trip() {
        let session = Session::new();
        session.install(pair()).await;
        assert!(session.is_authenticated().await);
        assert_eq!(session.access_token().await.as_deref(), Some("access-token"));

        session.clear().await;
        assert!(!session.is_authenticated().await);
        assert_eq!(session.access_token().await, None);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let session = Session::new();
        let other = session.clone();
        session.install(pair()).await;
        assert!(other.is_authenticated().await);
        other.clear().await;
        assert!(!session.is_authenticated().await);
    }
}
