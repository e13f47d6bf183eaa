use std::time::Duration;

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;
use webapi_request::ComposeError;

use crate::normalize::ResponseError;

/// Boxed error used at collaborator seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classification of URL validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUriKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL is missing required host/authority component
    MissingAuthority,
    /// URL scheme is neither `http` nor `https`
    UnsupportedScheme,
}

/// Transport-level failures: nothing usable came back from the server.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// The call did not complete within the configured timeout and was aborted
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport error (network, connection, proxy tunnel)
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// TLS setup error
    #[error("TLS error: {0}")]
    Tls(#[source] BoxError),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// Invalid target URL
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri {
        url: String,
        kind: InvalidUriKind,
        reason: String,
    },

    /// Proxy URL could not be used
    #[error("Invalid proxy '{url}': {reason}")]
    InvalidProxy { url: String, reason: String },
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

/// Everything the error continuation of a call can receive.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CallError {
    /// The descriptor was rejected before any I/O
    #[error(transparent)]
    Compose(#[from] ComposeError),

    /// Connect, TLS, timeout or protocol failure, delivered unchanged
    #[error(transparent)]
    Transport(#[from] HttpError),

    /// Request body could not be serialized
    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// A success response body could not be parsed
    #[error("Failed to parse response body: {0}")]
    Decode(#[source] BoxError),

    /// Non-success status, normalized
    #[error(transparent)]
    Status(Box<ResponseError>),

    /// Non-success status whose body was a list of errors
    #[error("HTTP {}: {} errors returned", status.as_u16(), errors.len())]
    MultiStatus { status: StatusCode, errors: Vec<Value> },
}

impl CallError {
    /// HTTP status of the response, if the server answered.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(err) => Some(err.status),
            Self::MultiStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the call was aborted by its timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(HttpError::Timeout(_)))
    }
}
