//! Agent pool.
//!
//! An agent is a pooled, keep-alive hyper client. Agents are keyed by proxy
//! identity (URL plus effective credentials) when a proxy applies and by
//! protocol otherwise. They are created on
//! first use, shared by every later call with the same key, and never torn
//! down. Two callers racing on a missing key build at most one agent: the
//! insert happens under the map's entry lock.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use http::{HeaderValue, Uri};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::client::legacy::{Builder, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use webapi_request::ProxyConfig;

use crate::config::{TlsRootConfig, TransportConfig};
use crate::error::{HttpError, InvalidUriKind};
use crate::proxy::ProxyTarget;
use crate::tls::https_connector;

type DirectClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;
type TunnelClient = Client<HttpsConnector<Tunnel<HttpConnector>>, Full<Bytes>>;

/// Target protocol of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    /// Protocol of `uri`.
    ///
    /// # Errors
    /// Returns [`HttpError::InvalidUri`] for schemes other than `http`/`https`.
    pub fn from_uri(uri: &Uri) -> Result<Self, HttpError> {
        match uri.scheme_str() {
            Some("http") => Ok(Self::Http),
            Some("https") => Ok(Self::Https),
            other => Err(HttpError::InvalidUri {
                url: uri.to_string(),
                kind: InvalidUriKind::UnsupportedScheme,
                reason: format!("unsupported scheme {}", other.unwrap_or("<none>")),
            }),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pool key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AgentKey {
    Protocol(Protocol),
    /// The authorization value is marked sensitive and never printed
    Proxy {
        uri: Uri,
        authorization: Option<HeaderValue>,
    },
}

/// A connection agent.
#[derive(Clone)]
pub enum Agent {
    Direct(DirectClient),
    /// Tunnels every connection through the proxy with `CONNECT`
    Proxied(TunnelClient),
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(_) => f.write_str("Agent::Direct"),
            Self::Proxied(_) => f.write_str("Agent::Proxied"),
        }
    }
}

impl Agent {
    /// Send a request and wait for the response head.
    ///
    /// # Errors
    /// Returns [`HttpError::Transport`] when connecting, tunnelling or the
    /// exchange fails.
    pub async fn send(
        &self,
        request: http::Request<Full<Bytes>>,
    ) -> Result<http::Response<Incoming>, HttpError> {
        let response = match self {
            Self::Direct(client) => client.request(request).await?,
            Self::Proxied(client) => client.request(request).await?,
        };
        Ok(response)
    }

    #[must_use]
    pub fn is_proxied(&self) -> bool {
        matches!(self, Self::Proxied(_))
    }
}

/// Shared, append-only cache of agents.
///
/// Hold it in an `Arc` and hand it to every transport that should share
/// connections.
pub struct AgentPool {
    agents: DashMap<AgentKey, Agent>,
    tls_roots: TlsRootConfig,
    pool_idle_timeout: Option<Duration>,
}

impl AgentPool {
    #[must_use]
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            agents: DashMap::new(),
            tls_roots: config.tls_roots,
            pool_idle_timeout: config.pool_idle_timeout,
        }
    }

    /// Agent for `protocol`, or for `proxy` when one applies. Created on
    /// first use.
    ///
    /// Proxy agents carry their `Proxy-Authorization` on every tunnel, so the
    /// same proxy URL with different credentials gets a separate agent.
    ///
    /// # Errors
    /// Returns [`HttpError::Tls`] when the TLS roots cannot be loaded and
    /// [`HttpError::InvalidProxy`] for unusable proxy URLs. Nothing is cached
    /// on failure.
    pub fn get_agent(
        &self,
        protocol: Protocol,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Agent, HttpError> {
        let target = proxy.map(ProxyTarget::parse).transpose()?;
        let key = match &target {
            Some(target) => AgentKey::Proxy {
                uri: target.uri.clone(),
                authorization: target.authorization.clone(),
            },
            None => AgentKey::Protocol(protocol),
        };

        if let Some(agent) = self.agents.get(&key) {
            return Ok(agent.value().clone());
        }

        let agent = self
            .agents
            .entry(key)
            .or_try_insert_with(|| self.build_agent(target))?;
        Ok(agent.value().clone())
    }

    /// Number of cached agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    fn build_agent(&self, proxy: Option<ProxyTarget>) -> Result<Agent, HttpError> {
        let builder = self.client_builder();
        match proxy {
            None => {
                let mut http = HttpConnector::new();
                http.enforce_http(false);
                let connector = https_connector(http, self.tls_roots)?;
                tracing::debug!("created direct agent");
                Ok(Agent::Direct(builder.build(connector)))
            }
            Some(target) => {
                let mut tunnel = Tunnel::new(target.uri.clone(), HttpConnector::new());
                if let Some(authorization) = target.authorization {
                    tunnel = tunnel.with_auth(authorization);
                }
                let connector = https_connector(tunnel, self.tls_roots)?;
                tracing::debug!(proxy = %target.uri, "created proxy agent");
                Ok(Agent::Proxied(builder.build(connector)))
            }
        }
    }

    fn client_builder(&self) -> Builder {
        let mut builder = Client::builder(TokioExecutor::new());
        // pool_timer drives pool_idle_timeout
        builder
            .pool_timer(TokioTimer::new())
            .pool_max_idle_per_host(usize::MAX)
            .http2_only(false);
        if let Some(idle) = self.pool_idle_timeout {
            builder.pool_idle_timeout(idle);
        }
        builder
    }
}

impl fmt::Debug for AgentPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentPool")
            .field("agents", &self.agents.len())
            .field("tls_roots", &self.tls_roots)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .finish()
    }
}
