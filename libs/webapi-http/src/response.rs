use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{CallError, HttpError};

/// Successful call outcome.
#[derive(Debug, Clone)]
pub struct WebApiResponse {
    /// Parsed body; `null` (or the configured empty value) for empty bodies
    pub data: Value,
    pub headers: HeaderMap,
    pub status: StatusCode,
}

impl WebApiResponse {
    /// Whether the server answered without content (`204`).
    #[must_use]
    pub fn is_no_content(&self) -> bool {
        self.status == StatusCode::NO_CONTENT
    }

    /// Deserialize the parsed body into `T`.
    ///
    /// # Errors
    /// Returns [`CallError::Decode`] when the payload does not match `T`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, CallError> {
        serde_json::from_value(self.data).map_err(|e| CallError::Decode(Box::new(e)))
    }

    /// Entity id from the `OData-EntityId` header of a create/upsert.
    #[must_use]
    pub fn entity_id(&self) -> Option<&str> {
        let value = self.headers.get("odata-entityid")?.to_str().ok()?;
        let start = value.rfind('(')? + 1;
        let end = value[start..].find(')')? + start;
        Some(&value[start..end])
    }
}

/// Buffer `body`, failing once more than `limit` bytes arrive.
pub async fn read_body_limited(body: Incoming, limit: usize) -> Result<Bytes, HttpError> {
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame?;
        if let Some(chunk) = frame.data_ref() {
            if collected.len() + chunk.len() > limit {
                return Err(HttpError::BodyTooLarge {
                    limit,
                    actual: collected.len() + chunk.len(),
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}
