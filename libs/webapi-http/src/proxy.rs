//! Proxy resolution and credentials.
//!
//! A call's proxy comes from, in order: the call itself, the transport
//! configuration, then the `<scheme>_proxy` environment variable (lower case
//! first, upper case as fallback).

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::{HeaderValue, Uri};
use secrecy::ExposeSecret;
use url::Url;
use webapi_request::ProxyConfig;

use crate::error::HttpError;
use crate::pool::Protocol;

/// Pick the proxy for a call.
#[must_use]
pub fn resolve(
    protocol: Protocol,
    explicit: Option<&ProxyConfig>,
    use_env: bool,
) -> Option<ProxyConfig> {
    explicit
        .cloned()
        .or_else(|| use_env.then(|| from_env(protocol)).flatten())
}

/// Proxy named by `http_proxy`/`https_proxy` (or `HTTP_PROXY`/`HTTPS_PROXY`).
#[must_use]
pub fn from_env(protocol: Protocol) -> Option<ProxyConfig> {
    let lower = format!("{}_proxy", protocol.as_str());
    let upper = lower.to_uppercase();
    [lower, upper].iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .map(ProxyConfig::new)
    })
}

/// A proxy ready for tunnelling: credential-free URI plus the
/// `Proxy-Authorization` value, if any.
#[derive(Debug, Clone)]
pub struct ProxyTarget {
    pub uri: Uri,
    pub authorization: Option<HeaderValue>,
}

impl ProxyTarget {
    /// Parse a proxy configuration. Explicit `auth` wins over credentials
    /// embedded in the URL.
    ///
    /// # Errors
    /// Returns [`HttpError::InvalidProxy`] for unparsable URLs, non-`http`
    /// schemes or URLs without a host.
    pub fn parse(config: &ProxyConfig) -> Result<Self, HttpError> {
        let invalid = |reason: &str| HttpError::InvalidProxy {
            url: redact(&config.url),
            reason: reason.to_owned(),
        };

        let mut url = Url::parse(&config.url).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid("only http:// proxies are supported"));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }

        let embedded = (!url.username().is_empty()).then(|| {
            (
                percent_decode(url.username()),
                url.password().map(percent_decode).unwrap_or_default(),
            )
        });
        let credentials = match &config.auth {
            Some(auth) => Some((
                auth.username.clone(),
                auth.password.expose_secret().to_owned(),
            )),
            None => embedded,
        };

        url.set_username("")
            .and_then(|()| url.set_password(None))
            .map_err(|()| invalid("cannot strip credentials"))?;
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;

        let authorization = credentials
            .map(|(username, password)| basic_auth(&username, &password))
            .transpose()?;

        Ok(Self { uri, authorization })
    }
}

fn basic_auth(username: &str, password: &str) -> Result<HeaderValue, HttpError> {
    let encoded = STANDARD.encode(format!("{username}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))?;
    value.set_sensitive(true);
    Ok(value)
}

fn percent_decode(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_owned(), Cow::into_owned)
}

/// Proxy URL with any password replaced, for logs and errors.
fn redact(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.password().is_some() => {
            if url.set_password(Some("***")).is_ok() {
                url.to_string()
            } else {
                "<redacted>".to_owned()
            }
        }
        Ok(url) => url.to_string(),
        Err(_) => raw.to_owned(),
    }
}
