#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP transport for OData Web API calls
//!
//! This crate sends requests composed by `webapi_request` over hyper:
//! - Automatic TLS via rustls (WebPki or native roots)
//! - Keep-alive agents shared through an [`AgentPool`], one per protocol or
//!   per proxy, never torn down
//! - `CONNECT` tunnelling through HTTP proxies, with basic auth
//! - `http_proxy`/`https_proxy` environment fallback
//! - Per-call timeouts that abort the call
//! - Per-call [`CallContext`]s: parsing options and exactly-once continuations
//! - Pluggable [`ResponseParser`] and [`ErrorNormalizer`] collaborators
//! - User-Agent header injection
//!
//! # Response classification
//!
//! `200`, `201`, `204`, `206` and `304` are successes; the body is parsed with
//! the call's own options. Every other status is an error. A JSON array body
//! becomes [`CallError::MultiStatus`]; otherwise the error is taken from the
//! body's `error` object, its `Message` field, the raw body text, or
//! `"Unexpected Error"`, in that order, and normalized into a
//! [`ResponseError`].
//!
//! # Example
//!
//! ```ignore
//! use webapi_http::{CallContext, HttpTransport, OutgoingRequest, ParseOptions};
//! use std::time::Duration;
//!
//! let transport = HttpTransport::builder()
//!     .timeout(Duration::from_secs(30))
//!     .build()?;
//!
//! let (context, outcome) = CallContext::channel(ParseOptions::default());
//! transport
//!     .send(OutgoingRequest::new(Method::GET, url), context)
//!     .await;
//! let response = outcome.await??;
//! ```

mod builder;
mod client;
mod config;
mod correlation;
mod error;
mod normalize;
mod parse;
mod pool;
pub mod proxy;
mod response;
pub mod tls;
mod transport;

pub use builder::HttpTransportBuilder;
pub use client::{ODATA_MAX_VERSION, ODATA_VERSION, WebApiClient};
pub use config::{DEFAULT_USER_AGENT, TlsRootConfig, TransportConfig};
pub use correlation::{CallContext, CorrelationId, ErrorFn, Release, SuccessFn};
pub use error::{BoxError, CallError, HttpError, InvalidUriKind};
pub use normalize::{DefaultErrorNormalizer, ErrorNormalizer, ResponseError, StatusMeta};
pub use parse::{JsonResponseParser, ParseOptions, ResponseParser};
pub use pool::{Agent, AgentKey, AgentPool, Protocol};
pub use response::{WebApiResponse, read_body_limited};
pub use transport::{HttpTransport, OutgoingRequest};
