//! TLS setup for agents.
//!
//! Native roots are read from the OS store once per process; every agent
//! built afterwards reuses the cached certificates.

use std::sync::{Arc, OnceLock};

use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use rustls_pki_types::CertificateDer;

use crate::config::TlsRootConfig;
use crate::error::HttpError;

static NATIVE_ROOTS: OnceLock<Vec<CertificateDer<'static>>> = OnceLock::new();

#[cfg(test)]
static LOAD_COUNT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

fn load_native_roots() -> Vec<CertificateDer<'static>> {
    #[cfg(test)]
    LOAD_COUNT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

    let result = rustls_native_certs::load_native_certs();
    for err in &result.errors {
        tracing::warn!(error = %err, "error loading native root certificate");
    }
    if result.certs.is_empty() {
        tracing::warn!("no native root CA certificates found");
    } else {
        tracing::debug!(count = result.certs.len(), "loaded native root certificates");
    }
    result.certs
}

/// Cached native root certificates (possibly empty).
#[must_use]
pub fn native_roots() -> &'static [CertificateDer<'static>] {
    NATIVE_ROOTS.get_or_init(load_native_roots).as_slice()
}

/// Installed default crypto provider, or a fresh aws-lc-rs one. Never installs
/// a process-wide default itself.
#[must_use]
pub fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn native_client_config() -> Result<rustls::ClientConfig, HttpError> {
    let certs = native_roots();
    if certs.is_empty() {
        return Err(HttpError::Tls(
            "no native root CA certificates found in OS certificate store".into(),
        ));
    }

    let mut store = rustls::RootCertStore::empty();
    let (added, ignored) = store.add_parsable_certificates(certs.iter().cloned());
    if ignored > 0 {
        tracing::warn!(added, ignored, "some native root certificates could not be parsed");
    }
    if added == 0 {
        return Err(HttpError::Tls(
            format!("none of the {} native root certificates could be parsed", certs.len()).into(),
        ));
    }

    Ok(
        rustls::ClientConfig::builder_with_provider(crypto_provider())
            .with_safe_default_protocol_versions()
            .map_err(|e| HttpError::Tls(Box::new(e)))?
            .with_root_certificates(store)
            .with_no_client_auth(),
    )
}

/// Wrap `inner` in a TLS connector that speaks both `http` and `https`,
/// negotiating HTTP/1.1 or HTTP/2 via ALPN.
///
/// # Errors
/// Returns [`HttpError::Tls`] when the selected root store cannot be loaded.
pub fn https_connector<C>(inner: C, roots: TlsRootConfig) -> Result<HttpsConnector<C>, HttpError> {
    let builder = match roots {
        TlsRootConfig::WebPki => HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(|e| HttpError::Tls(Box::new(e)))?,
        TlsRootConfig::Native => HttpsConnectorBuilder::new().with_tls_config(native_client_config()?),
    };
    Ok(builder
        .https_or_http()
        .enable_all_versions()
        .wrap_connector(inner))
}
