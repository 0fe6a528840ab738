use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::error::{ApiFailure, FieldErrors};
use tracing::debug;

use crate::session::Session;

/// A server-owned entity addressable under a named REST collection.
///
/// `Fields` is the full mutable field set sent on create and full update;
/// `Patch` carries only the fields a partial update touches.
pub trait RemoteRecord: Clone + Send + Sync + DeserializeOwned + 'static {
    type Fields: Serialize + Clone + Send + Sync + 'static;
    type Patch: Serialize + Clone + Send + Sync + 'static;

    const COLLECTION: &'static str;

    fn id(&self) -> i64;

    /// Local stand-in shown while a create is in flight. Its id is never
    /// exposed; the entry is addressed by a provisional key until the
    /// canonical record arrives.
    fn provisional(fields: &Self::Fields) -> Self;

    fn apply_fields(&mut self, fields: &Self::Fields);

    fn apply_patch(&mut self, patch: &Self::Patch);
}

/// Remote record client: one call per REST operation, returning the server's
/// canonical record or a typed failure. The trait is the seam mocked in
/// controller tests.
#[async_trait]
pub trait RecordApi<R: RemoteRecord>: Send + Sync {
    async fn create(&self, fields: &R::Fields) -> Result<R, ApiFailure>;
    async fn list(&self) -> Result<Vec<R>, ApiFailure>;
    async fn update(&self, id: i64, fields: &R::Fields) -> Result<R, ApiFailure>;
    async fn partial_update(&self, id: i64, patch: &R::Patch) -> Result<R, ApiFailure>;
    async fn delete(&self, id: i64) -> Result<(), ApiFailure>;
}

/// reqwest-backed implementation speaking the backend's REST conventions:
/// collection endpoints with a trailing slash, `PUT`/`PATCH`/`DELETE` on
/// `{collection}/{id}/`.
pub struct RestTransport {
    http: Client,
    base_url: String,
    session: Session,
}

impl RestTransport {
    pub fn new(base_url: impl Into<String>, session: Session) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{collection}/", self.base_url)
    }

    fn record_url(&self, collection: &str, id: i64) -> String {
        format!("{}/{collection}/{id}/", self.base_url)
    }

    /// Attaches the bearer token when the session holds one. A missing token
    /// is not an error here; the server decides what anonymous calls may do.
    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.access_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiFailure> {
        let request = self.authorize(request).await;
        let response = request
            .send()
            .await
            .map_err(|err| ApiFailure::Network(err.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(decode_failure(response).await)
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiFailure> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|err| ApiFailure::Network(format!("invalid response body: {err}")))
    }
}

/// Maps a non-success response onto the failure taxonomy. The body is decoded
/// defensively; an unreadable body never turns into a panic or a second error.
pub(crate) async fn decode_failure(response: Response) -> ApiFailure {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ApiFailure::Auth(FieldErrors::decode(&body).first_message().to_string())
        }
        StatusCode::NOT_FOUND => ApiFailure::NotFound,
        status if status.is_client_error() => ApiFailure::Validation(FieldErrors::decode(&body)),
        status => ApiFailure::Server {
            status: status.as_u16(),
        },
    }
}

#[async_trait]
impl<R: RemoteRecord> RecordApi<R> for RestTransport {
    async fn create(&self, fields: &R::Fields) -> Result<R, ApiFailure> {
        let url = self.collection_url(R::COLLECTION);
        debug!(collection = R::COLLECTION, "transport: create");
        self.send_json(self.http.post(url).json(fields)).await
    }

    async fn list(&self) -> Result<Vec<R>, ApiFailure> {
        let url = self.collection_url(R::COLLECTION);
        debug!(collection = R::COLLECTION, "transport: list");
        self.send_json(self.http.get(url)).await
    }

    async fn update(&self, id: i64, fields: &R::Fields) -> Result<R, ApiFailure> {
        let url = self.record_url(R::COLLECTION, id);
        debug!(collection = R::COLLECTION, id, "transport: update");
        self.send_json(self.http.put(url).json(fields)).await
    }

    async fn partial_update(&self, id: i64, patch: &R::Patch) -> Result<R, ApiFailure> {
        let url = self.record_url(R::COLLECTION, id);
        debug!(collection = R::COLLECTION, id, "transport: partial update");
        self.send_json(self.http.patch(url).json(patch)).await
    }

    async fn delete(&self, id: i64) -> Result<(), ApiFailure> {
        let url = self.record_url(R::COLLECTION, id);
        debug!(collection = R::COLLECTION, id, "transport: delete");
        self.send(self.http.delete(url)).await.map(|_| ())
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
