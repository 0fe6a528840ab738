use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const UNKNOWN_ERROR: &str = "unknown error";

/// Broad class of an API failure, for event payloads and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Validation,
    Server,
    Auth,
    NotFound,
}

/// Structured error payload from the API: an optional overall detail plus
/// per-field message lists. Decoded defensively; anything unrecognized
/// degrades to a generic detail message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn from_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(detail.into()),
            fields: BTreeMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    /// First field message, else the detail, else a generic fallback.
    pub fn first_message(&self) -> &str {
        self.fields
            .values()
            .find_map(|messages| messages.first())
            .or(self.detail.as_ref())
            .map(String::as_str)
            .unwrap_or(UNKNOWN_ERROR)
    }

    /// Decode an API error body. Accepts `{"detail": "..."}` as well as the
    /// per-field shape `{"username": ["taken"], "password": "too short"}`.
    pub fn decode(body: &str) -> Self {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
            return Self::from_detail(UNKNOWN_ERROR);
        };

        let mut errors = Self::default();
        for (key, value) in map {
            let messages: Vec<String> = match value {
                Value::String(message) => vec![message],
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(message) => Some(message),
                        _ => None,
                    })
                    .collect(),
                _ => continue,
            };
            if messages.is_empty() {
                continue;
            }
            if key == "detail" {
                errors.detail = messages.into_iter().next();
            } else {
                errors.fields.insert(key, messages);
            }
        }

        if errors.detail.is_none() && errors.fields.is_empty() {
            errors.detail = Some(UNKNOWN_ERROR.to_string());
        }
        errors
    }
}

/// Typed outcome of a failed API call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiFailure {
    #[error("network error: {0}")]
    Network(String),
    #[error("validation failed: {}", .0.first_message())]
    Validation(FieldErrors),
    #[error("server error (status {status})")]
    Server { status: u16 },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("record not found")]
    NotFound,
}

impl ApiFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            ApiFailure::Network(_) => FailureKind::Network,
            ApiFailure::Validation(_) => FailureKind::Validation,
            ApiFailure::Server { .. } => FailureKind::Server,
            ApiFailure::Auth(_) => FailureKind::Auth,
            ApiFailure::NotFound => FailureKind::NotFound,
        }
    }
}
