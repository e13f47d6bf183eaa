//! HTTP transport.
//!
//! [`HttpTransport`] sends one [`OutgoingRequest`] through a pooled agent,
//! buffers the whole response body and classifies the outcome. Success
//! statuses are parsed with the call's own options; everything else is
//! turned into a [`CallError`] through the error normalizer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST, USER_AGENT};
use http::uri::Authority;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use http_body_util::Full;
use serde_json::{Value, json};
use webapi_request::ProxyConfig;

use crate::builder::HttpTransportBuilder;
use crate::config::TransportConfig;
use crate::correlation::{CallContext, CorrelationId};
use crate::error::{CallError, HttpError, InvalidUriKind};
use crate::normalize::{DefaultErrorNormalizer, ErrorNormalizer, StatusMeta};
use crate::parse::{JsonResponseParser, ResponseParser};
use crate::pool::{AgentPool, Protocol};
use crate::proxy;
use crate::response::{WebApiResponse, read_body_limited};

const UNEXPECTED_ERROR: &str = "Unexpected Error";

/// One call, ready to send.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    /// Absolute `http` or `https` URL
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    /// Proxy for this call only
    pub proxy: Option<ProxyConfig>,
    /// Overrides the transport timeout for this call
    pub timeout: Option<Duration>,
}

impl OutgoingRequest {
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            proxy: None,
            timeout: None,
        }
    }

    /// Merge `headers` into the request, replacing same-named entries.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    #[must_use]
    pub fn with_body(mut self, content_type: HeaderValue, body: impl Into<Bytes>) -> Self {
        self.headers.insert(CONTENT_TYPE, content_type);
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body.
    ///
    /// # Errors
    /// Returns [`CallError::Encode`] when `value` cannot be serialized.
    pub fn with_json<T: serde::Serialize + ?Sized>(self, value: &T) -> Result<Self, CallError> {
        let body = serde_json::to_vec(value).map_err(CallError::Encode)?;
        Ok(self.with_body(
            HeaderValue::from_static("application/json; charset=utf-8"),
            body,
        ))
    }

    #[must_use]
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Non-blocking Web API transport.
///
/// Cheap to share behind an `Arc`; any number of calls may be in flight at
/// once. Each call carries its own parsing options, so concurrent calls never
/// observe each other's settings.
pub struct HttpTransport<P = JsonResponseParser, N = DefaultErrorNormalizer> {
    pub(crate) pool: Arc<AgentPool>,
    pub(crate) config: TransportConfig,
    pub(crate) user_agent: HeaderValue,
    pub(crate) parser: P,
    pub(crate) normalizer: N,
}

impl HttpTransport {
    #[must_use]
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }
}

impl<P, N> HttpTransport<P, N> {
    #[must_use]
    pub fn pool(&self) -> &Arc<AgentPool> {
        &self.pool
    }

    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl<P: ResponseParser, N: ErrorNormalizer> HttpTransport<P, N> {
    /// Send `request` and hand the outcome to the context's continuation.
    ///
    /// Exactly one continuation runs, once, after the whole body has been
    /// buffered (or the call failed).
    pub async fn send(&self, request: OutgoingRequest, context: CallContext<P::Options>) {
        let outcome = self.call(request, context.options(), context.id()).await;
        context.resolve(outcome);
    }

    /// Send `request` and return the outcome.
    ///
    /// # Errors
    /// Returns [`CallError::Transport`] when nothing usable came back,
    /// [`CallError::Status`] or [`CallError::MultiStatus`] for error statuses
    /// and [`CallError::Decode`] when a success body cannot be parsed.
    pub async fn execute(
        &self,
        request: OutgoingRequest,
        options: &P::Options,
    ) -> Result<WebApiResponse, CallError> {
        self.call(request, options, CorrelationId::new()).await
    }

    async fn call(
        &self,
        request: OutgoingRequest,
        options: &P::Options,
        id: CorrelationId,
    ) -> Result<WebApiResponse, CallError> {
        let started = Instant::now();
        let method = request.method.clone();

        let outcome = match self.exchange(request, id).await {
            Ok((status, headers, body)) => self.classify(status, headers, &body, options),
            Err(err) => Err(CallError::Transport(err)),
        };

        tracing::debug!(
            call_id = %id,
            method = %method,
            status = outcome.as_ref().ok().map(|r| r.status.as_u16()),
            elapsed_ms = started.elapsed().as_millis(),
            "web api call finished"
        );
        outcome
    }

    async fn exchange(
        &self,
        request: OutgoingRequest,
        id: CorrelationId,
    ) -> Result<(StatusCode, HeaderMap, Bytes), HttpError> {
        let OutgoingRequest {
            method,
            url,
            headers,
            body,
            proxy: call_proxy,
            timeout,
        } = request;

        let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| HttpError::InvalidUri {
            url: url.clone(),
            kind: InvalidUriKind::ParseError,
            reason: e.to_string(),
        })?;
        let protocol = Protocol::from_uri(&uri)?;
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| HttpError::InvalidUri {
                url: url.clone(),
                kind: InvalidUriKind::MissingAuthority,
                reason: "URL must have a host".to_owned(),
            })?;

        let proxy = proxy::resolve(
            protocol,
            call_proxy.as_ref().or(self.config.proxy.as_ref()),
            self.config.use_env_proxy,
        );
        let agent = self.pool.get_agent(protocol, proxy.as_ref())?;
        let headers =
            self.outgoing_headers(headers, body.as_ref(), agent.is_proxied().then_some(&authority))?;

        tracing::debug!(
            call_id = %id,
            method = %method,
            path = uri.path(),
            proxied = agent.is_proxied(),
            "dispatching web api call"
        );

        let mut outgoing = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(body.unwrap_or_default()))?;
        *outgoing.headers_mut() = headers;

        let limit = self.config.max_body_size;
        let exchange = async move {
            let response = agent.send(outgoing).await?;
            let (parts, body) = response.into_parts();
            let body = read_body_limited(body, limit).await?;
            Ok::<_, HttpError>((parts.status, parts.headers, body))
        };

        match timeout.or(self.config.timeout) {
            Some(deadline) => tokio::time::timeout(deadline, exchange)
                .await
                .map_err(|_| HttpError::Timeout(deadline))?,
            None => exchange.await,
        }
    }

    fn outgoing_headers(
        &self,
        mut extra: HeaderMap,
        body: Option<&Bytes>,
        proxied_host: Option<&Authority>,
    ) -> Result<HeaderMap, HttpError> {
        let mut headers = HeaderMap::with_capacity(extra.len() + 3);

        if let Some(body) = body {
            if let Some(content_type) = extra.remove(CONTENT_TYPE) {
                headers.insert(CONTENT_TYPE, content_type);
            }
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        headers.extend(extra);

        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, self.user_agent.clone());
        }
        if let Some(host) = proxied_host {
            headers.insert(HOST, HeaderValue::from_str(host.as_str())?);
        }

        Ok(headers)
    }

    fn classify(
        &self,
        status: StatusCode,
        headers: HeaderMap,
        body: &Bytes,
        options: &P::Options,
    ) -> Result<WebApiResponse, CallError> {
        let parsed = self.parser.parse(body, &headers, options);

        if is_success(status) {
            let data = parsed.map_err(CallError::Decode)?;
            return Ok(WebApiResponse {
                data,
                headers,
                status,
            });
        }

        let raw = if body.iter().all(u8::is_ascii_whitespace) {
            json!({ "message": UNEXPECTED_ERROR })
        } else {
            let body_text = || json!({ "message": String::from_utf8_lossy(body) });
            match parsed {
                Ok(Value::Array(errors)) => return Err(CallError::MultiStatus { status, errors }),
                Ok(Value::Object(mut map)) => match (map.remove("error"), map.remove("Message")) {
                    (Some(error), _) if is_truthy(&error) => error,
                    (_, Some(message)) if is_truthy(&message) => json!({ "message": message }),
                    _ => body_text(),
                },
                _ => body_text(),
            }
        };

        let error = self.normalizer.normalize(raw, StatusMeta::new(status, headers));
        Err(CallError::Status(Box::new(error)))
    }
}

impl<P, N> std::fmt::Debug for HttpTransport<P, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("pool", &self.pool)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn is_success(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 201 | 204 | 206 | 304)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n.abs() > f64::EPSILON),
        Value::Array(_) | Value::Object(_) => true,
    }
}
