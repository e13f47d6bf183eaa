#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Request composition for OData Web API calls
//!
//! This crate turns a declarative [`Request`] descriptor into the relative URL,
//! query string and headers of an OData call:
//! - Descriptor validation with operation-scoped errors ([`ComposeError`])
//! - Path composition (collection, key or alternate key, navigation, `$ref`)
//! - Query clauses in a fixed order, with recursive `$expand`
//! - `Prefer`, precondition, impersonation and bearer headers
//!
//! Nothing here performs I/O; see `webapi_http` for the transport.
//!
//! # Example
//!
//! ```ignore
//! use webapi_request::{Operation, Request, WebApiConfig, compose};
//!
//! let config = WebApiConfig::new("https://org.crm.dynamics.com/api/data/v9.2/");
//! let request = Request::new("accounts")
//!     .with_select(["name", "revenue"])
//!     .with_filter("statecode eq 0");
//!
//! let composed = compose(&request, &config, Operation::RetrieveMultiple)?;
//! assert_eq!(composed.url, "accounts?$select=name,revenue&$filter=statecode%20eq%200");
//! ```

mod compose;
mod config;
mod error;
pub mod headers;
mod operation;
mod request;
pub mod validate;

pub use compose::{ComposedRequest, UrlParts, compose, compose_url, unbrace_filter_guids};
pub use config::WebApiConfig;
pub use error::ComposeError;
pub use headers::{compose_headers, compose_prefer_header};
pub use operation::{Operation, Scope};
pub use request::{Expand, Prefer, ProxyAuth, ProxyConfig, Request};
pub use validate::Validated;
