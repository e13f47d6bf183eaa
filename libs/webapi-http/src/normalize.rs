//! Error normalization for non-success responses.
//!
//! The transport reduces an error body to a raw JSON object first: the
//! `error` member when present, else `{ "message": <Message> }`, else the body
//! text, else `"Unexpected Error"`. An [`ErrorNormalizer`] then turns that raw
//! object plus the status metadata into the [`ResponseError`] handed to the
//! caller.

use std::fmt;

use http::{HeaderMap, StatusCode};
use serde_json::{Map, Value};

/// Status line and headers of the failed response.
#[derive(Debug, Clone)]
pub struct StatusMeta {
    pub status: StatusCode,
    /// Reason phrase, e.g. `Not Found`; empty for unknown codes
    pub status_message: String,
    pub headers: HeaderMap,
}

impl StatusMeta {
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            status,
            status_message: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
        }
    }
}

/// Normalized server-side error.
#[derive(Debug, Clone)]
pub struct ResponseError {
    pub status: StatusCode,
    pub status_message: String,
    pub message: String,
    /// Service error code, e.g. `0x80040217`
    pub code: Option<String>,
    pub headers: HeaderMap,
    /// The raw error object with every field the server sent
    pub details: Map<String, Value>,
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ResponseError {}

/// Turns a raw error object and status metadata into a [`ResponseError`].
pub trait ErrorNormalizer: Send + Sync {
    fn normalize(&self, raw: Value, meta: StatusMeta) -> ResponseError;
}

/// Copies `message` and `code` out of the raw object and keeps the rest as
/// details.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorNormalizer;

impl ErrorNormalizer for DefaultErrorNormalizer {
    fn normalize(&self, raw: Value, meta: StatusMeta) -> ResponseError {
        let details = match raw {
            Value::Object(map) => map,
            Value::String(message) => Map::from_iter([("message".to_owned(), message.into())]),
            other => Map::from_iter([("message".to_owned(), Value::String(other.to_string()))]),
        };

        let message = match details.get("message") {
            Some(Value::String(message)) => message.clone(),
            Some(Value::Null) | None => meta.status_message.clone(),
            Some(other) => other.to_string(),
        };
        let code = details.get("code").and_then(|code| match code {
            Value::String(code) => Some(code.clone()),
            Value::Number(code) => Some(code.to_string()),
            _ => None,
        });

        ResponseError {
            status: meta.status,
            status_message: meta.status_message,
            message,
            code,
            headers: meta.headers,
            details,
        }
    }
}
