use std::sync::Arc;
use std::time::Duration;

use http::HeaderValue;
use webapi_request::ProxyConfig;

use crate::config::{TlsRootConfig, TransportConfig};
use crate::error::HttpError;
use crate::normalize::{DefaultErrorNormalizer, ErrorNormalizer};
use crate::parse::{JsonResponseParser, ResponseParser};
use crate::pool::AgentPool;
use crate::proxy::ProxyTarget;
use crate::transport::HttpTransport;

/// Builder for an [`HttpTransport`].
///
/// The parser and normalizer default to [`JsonResponseParser`] and
/// [`DefaultErrorNormalizer`]; swapping either changes the transport's type.
pub struct HttpTransportBuilder<P = JsonResponseParser, N = DefaultErrorNormalizer> {
    config: TransportConfig,
    pool: Option<Arc<AgentPool>>,
    parser: P,
    normalizer: N,
}

impl HttpTransportBuilder {
    /// Create a new builder with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Create a builder with a specific configuration
    #[must_use]
    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            config,
            pool: None,
            parser: JsonResponseParser,
            normalizer: DefaultErrorNormalizer,
        }
    }
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, N> HttpTransportBuilder<P, N> {
    /// Set the per-call timeout. Without one, calls wait indefinitely.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the user agent string
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the maximum response body size
    #[must_use]
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    /// Set the TLS root certificate source
    #[must_use]
    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Set how long idle keep-alive connections are kept
    #[must_use]
    pub fn pool_idle_timeout(mut self, idle: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = idle;
        self
    }

    /// Route calls without their own proxy through `proxy`
    #[must_use]
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Whether `http_proxy`/`https_proxy` are consulted
    #[must_use]
    pub fn use_env_proxy(mut self, enabled: bool) -> Self {
        self.config.use_env_proxy = enabled;
        self
    }

    /// Share an existing agent pool. The pool keeps its own TLS and idle
    /// settings.
    #[must_use]
    pub fn pool(mut self, pool: Arc<AgentPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Replace the response parser
    #[must_use]
    pub fn parser<P2: ResponseParser>(self, parser: P2) -> HttpTransportBuilder<P2, N> {
        HttpTransportBuilder {
            config: self.config,
            pool: self.pool,
            parser,
            normalizer: self.normalizer,
        }
    }

    /// Replace the error normalizer
    #[must_use]
    pub fn normalizer<N2: ErrorNormalizer>(self, normalizer: N2) -> HttpTransportBuilder<P, N2> {
        HttpTransportBuilder {
            config: self.config,
            pool: self.pool,
            parser: self.parser,
            normalizer,
        }
    }

    /// Build the transport.
    ///
    /// # Errors
    /// Returns [`HttpError::InvalidHeaderValue`] for a user agent that is not
    /// a valid header value and [`HttpError::InvalidProxy`] for an unusable
    /// configured proxy.
    pub fn build(self) -> Result<HttpTransport<P, N>, HttpError> {
        let user_agent = HeaderValue::from_str(&self.config.user_agent)?;

        if let Some(proxy) = &self.config.proxy {
            ProxyTarget::parse(proxy)?;
        }

        let pool = self
            .pool
            .unwrap_or_else(|| Arc::new(AgentPool::new(&self.config)));

        Ok(HttpTransport {
            pool,
            config: self.config,
            user_agent,
            parser: self.parser,
            normalizer: self.normalizer,
        })
    }
}
