//! Descriptor validation.
//!
//! [`request`] runs once, before any composition, and yields a [`Validated`]
//! descriptor whose identifiers are already normalized: braces stripped from
//! GUIDs, alternate keys re-quoted, `id` folded into `key`. Composition never
//! has to re-check a field.

use std::ops::Deref;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ComposeError;
use crate::operation::{Operation, Scope};
use crate::request::{Expand, Request};

const GUID_TYPE: &str = "GUID String";
const KEY_TYPE: &str = "String representing GUID or Alternate Key";

#[allow(clippy::expect_used)] // static pattern
static GUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("static regex should not panic")
});

#[allow(clippy::expect_used)] // static pattern
static BRACED_GUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\{?([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})\}?$")
        .expect("static regex should not panic")
});

#[allow(clippy::expect_used)] // static pattern
static ALTERNATE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w\d_]+=(.+)$").expect("static regex should not panic")
});

/// A descriptor that passed validation, bound to the operation it was
/// validated for.
#[derive(Debug, Clone)]
pub struct Validated {
    request: Request,
    operation: Operation,
}

impl Validated {
    #[must_use]
    pub fn operation(&self) -> Operation {
        self.operation
    }

    #[must_use]
    pub fn into_inner(self) -> Request {
        self.request
    }
}

impl Deref for Validated {
    type Target = Request;

    fn deref(&self) -> &Request {
        &self.request
    }
}

/// Validate and normalize a descriptor for `operation`.
///
/// # Errors
/// - [`ComposeError::MissingParameter`] when `collection` is absent on a bound
///   request, or when the operation needs a record key and neither `key` nor
///   `id` is set
/// - [`ComposeError::InvalidParameter`] for malformed GUIDs, keys or `Prefer`
///   page sizes
/// - [`ComposeError::ConflictingParameters`] when both `ifmatch` and
///   `ifnonematch` are supplied, at any nesting level
pub fn request(request: &Request, operation: Operation) -> Result<Validated, ComposeError> {
    let scope = Scope::top(operation);
    let mut normalized = request.clone();
    normalize(&mut normalized, scope)?;

    if normalized.url.is_none() {
        if !normalized.unbound {
            require(normalized.collection.as_deref(), "request.collection", scope)?;
        }
        if operation.requires_key() && normalized.key.is_none() {
            return Err(missing(scope, "request.id"));
        }
    }

    if let Some(prefer) = &normalized.prefer {
        for token in prefer.tokens() {
            if let Some(size) = token.strip_prefix("odata.maxpagesize=") {
                page_size(size, scope)?;
            }
        }
    }

    Ok(Validated {
        request: normalized,
        operation,
    })
}

fn normalize(request: &mut Request, scope: Scope) -> Result<(), ComposeError> {
    exclusive(
        request.if_match.as_deref(),
        request.if_none_match.as_deref(),
        ("request.ifmatch", "request.ifnonematch"),
        scope,
    )?;

    // key wins over id; id is not checked at all when key is present
    if let Some(raw) = request.key.take() {
        request.key = Some(key(&raw, "request.key", scope)?);
        request.id = None;
    } else if let Some(raw) = request.id.take() {
        request.key = Some(guid(&raw, "request.id", scope)?);
    }

    if let Some(raw) = request.navigation_property_key.take() {
        request.navigation_property_key =
            Some(key(&raw, "request.navigationPropertyKey", scope)?);
    }
    if let Some(raw) = request.impersonate.take() {
        request.impersonate = Some(guid(&raw, "request.impersonate", scope)?);
    }
    if let Some(raw) = request.saved_query.take() {
        request.saved_query = Some(guid(&raw, "request.savedQuery", scope)?);
    }
    if let Some(raw) = request.user_query.take() {
        request.user_query = Some(guid(&raw, "request.userQuery", scope)?);
    }

    if let Some(Expand::Items(items)) = &mut request.expand {
        let nested = scope.expand();
        for item in items.iter_mut() {
            normalize(item, nested)?;
        }
    }

    Ok(())
}

/// Require a non-empty value.
///
/// # Errors
/// Returns [`ComposeError::MissingParameter`] when `value` is `None` or blank.
pub fn require<'a>(
    value: Option<&'a str>,
    parameter: &str,
    scope: Scope,
) -> Result<&'a str, ComposeError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(missing(scope, parameter)),
    }
}

/// Extract the GUID contained in `value`, braces and surrounding text dropped.
///
/// # Errors
/// Returns [`ComposeError::InvalidParameter`] when no GUID is found.
pub fn guid(value: &str, parameter: &str, scope: Scope) -> Result<String, ComposeError> {
    GUID.find(value)
        .map(|m| m.as_str().to_owned())
        .ok_or_else(|| invalid(scope, parameter, GUID_TYPE))
}

/// Normalize a record key: a (braced) GUID, or comma separated alternate keys
/// of the form `name=value`. Double quotes in alternate key values are
/// replaced with single quotes.
///
/// # Errors
/// Returns [`ComposeError::InvalidParameter`] when the key is neither form.
pub fn key(value: &str, parameter: &str, scope: Scope) -> Result<String, ComposeError> {
    if let Some(caps) = BRACED_GUID.captures(value.trim()) {
        return Ok(caps[1].to_owned());
    }

    let mut keys = Vec::new();
    for part in value.split(',') {
        let part = part.trim().replace('"', "'");
        if !ALTERNATE_KEY.is_match(&part) {
            return Err(invalid(scope, parameter, KEY_TYPE));
        }
        keys.push(part);
    }
    Ok(keys.join(","))
}

/// Reject descriptors carrying both of two mutually exclusive fields.
///
/// # Errors
/// Returns [`ComposeError::ConflictingParameters`] when both are present.
pub fn exclusive(
    first: Option<&str>,
    second: Option<&str>,
    names: (&str, &str),
    scope: Scope,
) -> Result<(), ComposeError> {
    if first.is_some() && second.is_some() {
        return Err(ComposeError::ConflictingParameters {
            operation: scope.label(),
            first: names.0.to_owned(),
            second: names.1.to_owned(),
        });
    }
    Ok(())
}

fn page_size(value: &str, scope: Scope) -> Result<u32, ComposeError> {
    value
        .trim()
        .trim_matches('"')
        .parse()
        .map_err(|_| invalid(scope, "request.prefer", "Number"))
}

fn missing(scope: Scope, parameter: &str) -> ComposeError {
    ComposeError::MissingParameter {
        operation: scope.label(),
        parameter: parameter.to_owned(),
    }
}

fn invalid(scope: Scope, parameter: &str, expected: &str) -> ComposeError {
    ComposeError::InvalidParameter {
        operation: scope.label(),
        parameter: parameter.to_owned(),
        expected: expected.to_owned(),
    }
}
