//! Response body parsing.

use http::HeaderMap;
use serde_json::Value;

use crate::error::BoxError;

/// Interprets a buffered response body.
///
/// `Options` travel with each call inside its
/// [`CallContext`](crate::CallContext), so concurrent calls never see each
/// other's settings.
pub trait ResponseParser: Send + Sync {
    type Options: Send + Sync;

    /// Parse `body`.
    ///
    /// # Errors
    /// Returns an error when the body is not in the expected format.
    fn parse(
        &self,
        body: &[u8],
        headers: &HeaderMap,
        options: &Self::Options,
    ) -> Result<Value, BoxError>;
}

/// Per-call options of [`JsonResponseParser`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOptions {
    /// Value returned for an empty body (default: `null`)
    pub value_if_empty: Option<Value>,
    /// Return `@odata.count` instead of the whole payload
    pub to_count: bool,
}

impl ParseOptions {
    #[must_use]
    pub fn value_if_empty(mut self, value: Value) -> Self {
        self.value_if_empty = Some(value);
        self
    }

    #[must_use]
    pub fn to_count(mut self) -> Self {
        self.to_count = true;
        self
    }
}

/// JSON body parser. An empty body (e.g. `204 No Content`) yields the
/// configured empty value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResponseParser;

impl ResponseParser for JsonResponseParser {
    type Options = ParseOptions;

    fn parse(
        &self,
        body: &[u8],
        _headers: &HeaderMap,
        options: &ParseOptions,
    ) -> Result<Value, BoxError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(options.value_if_empty.clone().unwrap_or(Value::Null));
        }

        let mut value: Value = serde_json::from_slice(body)?;

        if options.to_count {
            return Ok(value
                .get_mut("@odata.count")
                .map_or(Value::Null, Value::take));
        }

        Ok(value)
    }
}
