//! Header composition.

use http::header::{AUTHORIZATION, CACHE_CONTROL, IF_MATCH, IF_NONE_MATCH};
use http::{HeaderMap, HeaderName, HeaderValue};
use secrecy::ExposeSecret;

use crate::config::WebApiConfig;
use crate::error::ComposeError;
use crate::request::Request;
use crate::validate::Validated;

pub const PREFER: HeaderName = HeaderName::from_static("prefer");
pub const CALLER_ID: HeaderName = HeaderName::from_static("mscrmcallerid");
pub const SUPPRESS_DUPLICATE_DETECTION: HeaderName =
    HeaderName::from_static("mscrm.suppressduplicatedetection");
pub const MERGE_LABELS: HeaderName = HeaderName::from_static("mscrm.mergelabels");
pub const CONTENT_ID: HeaderName = HeaderName::from_static("content-id");

/// Build the header map for a validated descriptor.
///
/// # Errors
/// Returns [`ComposeError::InvalidParameter`] when a value cannot be carried
/// in an HTTP header (control characters, newlines).
pub fn compose_headers(
    request: &Validated,
    config: &WebApiConfig,
) -> Result<HeaderMap, ComposeError> {
    let label = request.operation().as_str();
    let value = |raw: &str, parameter: &str| {
        HeaderValue::from_str(raw).map_err(|_| ComposeError::InvalidParameter {
            operation: label.to_owned(),
            parameter: parameter.to_owned(),
            expected: "header-safe String".to_owned(),
        })
    };

    let mut headers = HeaderMap::new();

    if let Some(prefer) = compose_prefer_header(request, config) {
        headers.insert(PREFER, value(&prefer, "request.prefer")?);
    }
    if let Some(etag) = &request.if_match {
        headers.insert(IF_MATCH, value(etag, "request.ifmatch")?);
    }
    if let Some(etag) = &request.if_none_match {
        headers.insert(IF_NONE_MATCH, value(etag, "request.ifnonematch")?);
    }
    if let Some(caller) = &request.impersonate {
        headers.insert(CALLER_ID, value(caller, "request.impersonate")?);
    }
    if let Some(token) = &request.token {
        let mut bearer = value(
            &format!("Bearer {}", token.expose_secret()),
            "request.token",
        )?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
    }
    if request.duplicate_detection {
        // the server expects this literal value to turn detection on
        headers.insert(
            SUPPRESS_DUPLICATE_DETECTION,
            HeaderValue::from_static("false"),
        );
    }
    if request.no_cache {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    }
    if request.merge_labels {
        headers.insert(MERGE_LABELS, HeaderValue::from_static("true"));
    }
    if let Some(content_id) = &request.content_id
        && !content_id.starts_with('$')
    {
        headers.insert(CONTENT_ID, value(content_id, "request.contentId")?);
    }

    Ok(headers)
}

/// Merge raw `Prefer` tokens, typed descriptor fields and config defaults into
/// one `Prefer` value, or `None` when nothing is requested.
///
/// Raw tokens beat typed fields, typed fields beat the config. The output
/// token order is fixed: `return=representation`,
/// `odata.include-annotations`, `odata.maxpagesize`, `odata.track-changes`.
#[must_use]
pub fn compose_prefer_header(request: &Request, config: &WebApiConfig) -> Option<String> {
    let mut return_representation = request.return_representation;
    let mut include_annotations = request.include_annotations.clone();
    let mut max_page_size = request.max_page_size;
    let mut track_changes = request.track_changes;

    if let Some(prefer) = &request.prefer {
        for token in prefer.tokens() {
            if token == "return=representation" {
                return_representation = Some(true);
            } else if let Some(annotations) = token.strip_prefix("odata.include-annotations=") {
                include_annotations = Some(annotations.replace('"', ""));
            } else if let Some(size) = token.strip_prefix("odata.maxpagesize=") {
                max_page_size = size.trim().trim_matches('"').parse().ok();
            } else if token.contains("odata.track-changes") {
                track_changes = true;
            }
        }
    }

    let return_representation = return_representation.unwrap_or(config.return_representation);
    let include_annotations = include_annotations
        .filter(|a| !a.is_empty())
        .or_else(|| config.include_annotations.clone());
    let max_page_size = max_page_size
        .filter(|size| *size > 0)
        .unwrap_or(config.max_page_size);

    let mut tokens = Vec::new();
    if return_representation {
        tokens.push("return=representation".to_owned());
    }
    if let Some(annotations) = include_annotations {
        tokens.push(format!("odata.include-annotations=\"{annotations}\""));
    }
    if max_page_size > 0 {
        tokens.push(format!("odata.maxpagesize={max_page_size}"));
    }
    if track_changes {
        tokens.push("odata.track-changes".to_owned());
    }

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(","))
    }
}
