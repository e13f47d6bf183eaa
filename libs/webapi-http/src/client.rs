use std::sync::Arc;

use http::header::ACCEPT;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;
use webapi_request::{Operation, Request, WebApiConfig, compose};

use crate::builder::HttpTransportBuilder;
use crate::config::TransportConfig;
use crate::correlation::CallContext;
use crate::error::{CallError, HttpError};
use crate::normalize::{DefaultErrorNormalizer, ErrorNormalizer};
use crate::parse::{JsonResponseParser, ResponseParser};
use crate::response::WebApiResponse;
use crate::transport::{HttpTransport, OutgoingRequest};

pub const ODATA_MAX_VERSION: HeaderName = HeaderName::from_static("odata-maxversion");
pub const ODATA_VERSION: HeaderName = HeaderName::from_static("odata-version");

/// Composes descriptors against one service root and sends them.
///
/// ```ignore
/// use webapi_http::{ParseOptions, WebApiClient};
/// use webapi_request::{Operation, Request, WebApiConfig};
///
/// let client = WebApiClient::new(WebApiConfig::new("https://org.example.com/api/data/v9.2/"))?;
/// let request = Request::new("accounts").with_select(["name"]).with_token(token);
/// let accounts = client
///     .execute(Method::GET, &request, Operation::RetrieveMultiple, None, &ParseOptions::default())
///     .await?;
/// ```
pub struct WebApiClient<P = JsonResponseParser, N = DefaultErrorNormalizer> {
    config: WebApiConfig,
    transport: Arc<HttpTransport<P, N>>,
}

impl WebApiClient {
    /// Client with a default transport.
    ///
    /// # Errors
    /// Returns [`HttpError`] when the default transport cannot be built.
    pub fn new(config: WebApiConfig) -> Result<Self, HttpError> {
        Self::with_transport_config(config, TransportConfig::default())
    }

    /// Client with a transport built from `transport`.
    ///
    /// # Errors
    /// Returns [`HttpError`] when the transport cannot be built.
    pub fn with_transport_config(
        config: WebApiConfig,
        transport: TransportConfig,
    ) -> Result<Self, HttpError> {
        let transport = HttpTransportBuilder::with_config(transport).build()?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }
}

impl<P, N> WebApiClient<P, N> {
    #[must_use]
    pub fn with_transport(config: WebApiConfig, transport: Arc<HttpTransport<P, N>>) -> Self {
        Self { config, transport }
    }

    #[must_use]
    pub fn config(&self) -> &WebApiConfig {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<HttpTransport<P, N>> {
        &self.transport
    }
}

impl<P: ResponseParser, N: ErrorNormalizer> WebApiClient<P, N> {
    /// Compose `request` into a ready-to-send call.
    ///
    /// # Errors
    /// Returns [`CallError::Compose`] for invalid descriptors and
    /// [`CallError::Encode`] when `body` cannot be serialized.
    pub fn prepare(
        &self,
        method: Method,
        request: &Request,
        operation: Operation,
        body: Option<&Value>,
    ) -> Result<OutgoingRequest, CallError> {
        let composed = compose(request, &self.config, operation)?;
        if !composed.is_async {
            tracing::debug!(operation = %operation, "synchronous call requested, sending non-blocking");
        }

        let mut headers = HeaderMap::with_capacity(composed.headers.len() + 3);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(ODATA_MAX_VERSION, HeaderValue::from_static("4.0"));
        headers.insert(ODATA_VERSION, HeaderValue::from_static("4.0"));
        headers.extend(composed.headers);

        let mut outgoing =
            OutgoingRequest::new(method, self.config.url_for(&composed.url))
                .with_headers(headers);
        if let Some(body) = body {
            outgoing = outgoing.with_json(body)?;
        }
        if let Some(proxy) = &request.proxy {
            outgoing = outgoing.with_proxy(proxy.clone());
        }
        Ok(outgoing)
    }

    /// Compose and send `request`, returning the outcome.
    ///
    /// # Errors
    /// Returns [`CallError::Compose`] before any I/O for invalid descriptors,
    /// otherwise whatever [`HttpTransport::execute`] returns.
    pub async fn execute(
        &self,
        method: Method,
        request: &Request,
        operation: Operation,
        body: Option<&Value>,
        options: &P::Options,
    ) -> Result<WebApiResponse, CallError> {
        let outgoing = self.prepare(method, request, operation, body)?;
        self.transport.execute(outgoing, options).await
    }

    /// Compose and send `request`, delivering the outcome to `context`.
    /// Composition failures reach the error continuation without any I/O.
    pub async fn dispatch(
        &self,
        method: Method,
        request: &Request,
        operation: Operation,
        body: Option<&Value>,
        context: CallContext<P::Options>,
    ) {
        match self.prepare(method, request, operation, body) {
            Ok(outgoing) => self.transport.send(outgoing, context).await,
            Err(err) => context.resolve(Err(err)),
        }
    }
}

impl<P, N> Clone for WebApiClient<P, N> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<P, N> std::fmt::Debug for WebApiClient<P, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebApiClient")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .finish()
    }
}
