use std::time::Duration;

use serde::Deserialize;
use webapi_request::ProxyConfig;

/// Default User-Agent string for outgoing calls
pub const DEFAULT_USER_AGENT: &str = concat!("webapi-http/", env!("CARGO_PKG_VERSION"));

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Transport configuration
///
/// Deserializes from camelCase keys with human readable durations:
///
/// ```json
/// { "timeout": "30s", "maxBodySize": 1048576, "proxy": { "url": "http://proxy:3128" } }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportConfig {
    /// Per-call timeout; `None` waits indefinitely (default: `None`)
    #[serde(deserialize_with = "humantime_option::deserialize")]
    pub timeout: Option<Duration>,

    /// Maximum buffered response body size in bytes (default: 64 MB)
    pub max_body_size: usize,

    /// User-Agent header value, sent unless the caller supplies one
    pub user_agent: String,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,

    /// Idle connection timeout of each agent (default: 90 seconds)
    ///
    /// Agents themselves are never evicted; this only closes idle sockets.
    #[serde(deserialize_with = "humantime_option::deserialize")]
    pub pool_idle_timeout: Option<Duration>,

    /// Proxy used when a call does not name one
    pub proxy: Option<ProxyConfig>,

    /// Consult `http_proxy` / `https_proxy` when no proxy is configured
    /// (default: true)
    pub use_env_proxy: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            max_body_size: 64 * 1024 * 1024,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            tls_roots: TlsRootConfig::default(),
            pool_idle_timeout: Some(Duration::from_secs(90)),
            proxy: None,
            use_env_proxy: true,
        }
    }
}

impl TransportConfig {
    /// Small limits and a 10 second timeout
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            timeout: Some(Duration::from_secs(10)),
            max_body_size: 1024 * 1024,
            pool_idle_timeout: Some(Duration::from_secs(30)),
            ..Self::default()
        }
    }

    /// Configuration for tests against local mock servers: short timeout, no
    /// environment proxy
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            timeout: Some(Duration::from_secs(5)),
            use_env_proxy: false,
            ..Self::default()
        }
    }
}

mod humantime_option {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, de};

    pub fn deserialize<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(d)?
            .map(|raw| {
                humantime::parse_duration(&raw).map_err(|_| {
                    de::Error::invalid_value(de::Unexpected::Str(&raw), &"a duration")
                })
            })
            .transpose()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, None);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert!(config.use_env_proxy);
        assert_eq!(config.tls_roots, TlsRootConfig::WebPki);
    }

    #[test]
    fn test_presets() {
        assert_eq!(
            TransportConfig::minimal().timeout,
            Some(Duration::from_secs(10))
        );
        assert!(!TransportConfig::for_testing().use_env_proxy);
    }

    #[test]
    fn test_deserialize_humantime() {
        let config: TransportConfig = serde_json::from_str(
            r#"{"timeout":"1m 30s","poolIdleTimeout":null,"tlsRoots":"native",
                "proxy":{"url":"http://proxy.local:3128"}}"#,
        )
        .unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.pool_idle_timeout, None);
        assert_eq!(config.tls_roots, TlsRootConfig::Native);
        assert_eq!(config.proxy.unwrap().url, "http://proxy.local:3128");
        assert_eq!(config.max_body_size, 64 * 1024 * 1024);
    }

    #[test]
    fn test_deserialize_rejects_bad_duration() {
        let result = serde_json::from_str::<TransportConfig>(r#"{"timeout":"soon"}"#);
        assert!(result.is_err());
    }
}
