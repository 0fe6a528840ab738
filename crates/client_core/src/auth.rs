use reqwest::Client;
use shared::error::ApiFailure;
use shared::protocol::{RegisterRequest, TokenPair, TokenRequest};
use thiserror::Error;
use tracing::{info, warn};

use crate::session::Session;
use crate::transport::decode_failure;

/// Client for the authentication endpoints. Record traffic goes through
/// [`crate::RestTransport`]; this only exchanges credentials for tokens and
/// registers accounts.
pub struct AuthClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
    /// Registered and implicitly logged in.
    LoggedIn,
    /// Registered, but the implicit login failed; route to manual login.
    RegisteredLoginRequired,
}

#[derive(Debug, Error)]
pub enum SignupError {
    #[error("username is required")]
    MissingUsername,
    #[error(
        "password must be at least 8 characters and include uppercase, lowercase, and a number or symbol"
    )]
    WeakPassword,
    #[error(transparent)]
    Remote(#[from] ApiFailure),
}

impl AuthClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Exchanges credentials for a token pair and installs it into the
    /// session.
    pub async fn login(
        &self,
        session: &Session,
        username: &str,
        password: &str,
    ) -> Result<(), ApiFailure> {
        let response = self
            .http
            .post(format!("{}/auth/token/", self.base_url))
            .json(&TokenRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(|err| ApiFailure::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(decode_failure(response).await);
        }
        let tokens: TokenPair = response
            .json()
            .await
            .map_err(|err| ApiFailure::Network(format!("invalid token response: {err}")))?;
        session.install(tokens).await;
        info!(username, "auth: login succeeded");
        Ok(())
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), ApiFailure> {
        let response = self
            .http
            .post(format!("{}/register/", self.base_url))
            .json(&RegisterRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(|err| ApiFailure::Network(err.to_string()))?;

        if !response.status().is_success() {
            return Err(decode_failure(response).await);
        }
        info!(username, "auth: account registered");
        Ok(())
    }

    /// Signup flow: local policy checks, register, then an implicit login
    /// attempt. A failed implicit login is not a registration error; the
    /// caller routes the user to manual login instead.
    pub async fn sign_up(
        &self,
        session: &Session,
        username: &str,
        password: &str,
    ) -> Result<SignupOutcome, SignupError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(SignupError::MissingUsername);
        }
        if !validate_password(password) {
            return Err(SignupError::WeakPassword);
        }

        self.register(username, password).await?;

        match self.login(session, username, password).await {
            Ok(()) => Ok(SignupOutcome::LoggedIn),
            Err(err) => {
                warn!(username, "auth: implicit login after signup failed: {err}");
                Ok(SignupOutcome::RegisteredLoginRequired)
            }
        }
    }
}

/// At least 8 characters with lowercase, uppercase, and a digit or symbol.
pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit() || !c.is_alphanumeric())
}

/// Coarse 0-4 score for the signup strength meter.
pub fn password_strength(password: &str) -> u8 {
    if password.is_empty() {
        return 0;
    }
    let length = password.chars().count();
    let mut score = 0;
    if length >= 8 {
        score += 1;
    }
    if length >= 12 {
        score += 1;
    }
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        score += 1;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        score += 1;
    }
    score.min(4)
}

pub fn strength_label(score: u8) -> &'static str {
    match score {
        1 => "Weak",
        2 => "Fair",
        3 => "Good",
        4 => "Strong",
        _ => "Very Weak",
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
