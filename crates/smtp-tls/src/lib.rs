//! TLS connector construction for the SMTP dialog engine, grounded on
//! kumomta's `kumo-tls-helper` crate. Simplified to a single TLS backend:
//! this workspace has no use for the teacher's dual rustls/openssl path
//! or its RFC 6698 DANE/TLSA certificate pinning, since outbound
//! reachability probing has no occasion to present a client certificate
//! or pin a DANE TLSA record.

mod danger;

use lru_ttl_cache::LruCacheWithTtl;
use rustls::crypto::{aws_lc_rs as provider, CryptoProvider};
use rustls::{ClientConfig, SupportedProtocolVersion};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tokio_rustls::TlsConnector;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to build rustls client config: {0}")]
    Config(String),
}

/// The minimum acceptable negotiated protocol version, mirroring the
/// `minVersion` field of the public `tlsPolicy` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MinTlsVersion {
    Tls12,
    Tls13,
}

impl MinTlsVersion {
    fn protocol_versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            MinTlsVersion::Tls12 => rustls::ALL_VERSIONS,
            MinTlsVersion::Tls13 => &rustls::ALL_VERSIONS[..1],
        }
    }
}

/// Policy applied when upgrading an SMTP connection to TLS, either via
/// STARTTLS or on an implicit-TLS port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TlsOptions {
    pub reject_unauthorized: bool,
    pub min_version: MinTlsVersion,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            reject_unauthorized: true,
            min_version: MinTlsVersion::Tls12,
        }
    }
}

static CONNECTOR_CACHE: LazyLock<LruCacheWithTtl<TlsOptions, Arc<ClientConfig>>> =
    LazyLock::new(|| LruCacheWithTtl::new_named("smtp_tls_connector", 32, Duration::from_secs(900)));

impl TlsOptions {
    /// Builds (or returns a cached) [`TlsConnector`] for this policy.
    /// Loading the platform certificate store is non-trivial, so the
    /// resulting `ClientConfig` is cached for 15 minutes, same rationale
    /// and duration as the teacher's `RUSTLS_CACHE`.
    pub fn build_connector(&self) -> Result<TlsConnector, TlsError> {
        if let Some(config) = CONNECTOR_CACHE.get(self) {
            return Ok(TlsConnector::from(config));
        }

        let crypto_provider = Arc::new(provider::default_provider());

        let verifier: Arc<dyn rustls::client::danger::ServerCertVerifier> =
            if self.reject_unauthorized {
                Arc::new(
                    rustls_platform_verifier::Verifier::new()
                        .with_provider(crypto_provider.clone()),
                )
            } else {
                Arc::new(danger::NoCertificateVerification::new(
                    crypto_provider.clone(),
                ))
            };

        let config = ClientConfig::builder_with_provider(crypto_provider)
            .with_protocol_versions(self.min_version.protocol_versions())
            .map_err(|e| TlsError::Config(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();

        let config = Arc::new(config);
        CONNECTOR_CACHE.set(*self, config.clone());

        Ok(TlsConnector::from(config))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builds_connector_with_platform_verifier() {
        let opts = TlsOptions::default();
        assert!(opts.build_connector().is_ok());
    }

    #[test]
    fn builds_insecure_connector() {
        let opts = TlsOptions {
            reject_unauthorized: false,
            min_version: MinTlsVersion::Tls13,
        };
        assert!(opts.build_connector().is_ok());
    }

    #[test]
    fn connector_is_cached() {
        let opts = TlsOptions::default();
        opts.build_connector().unwrap();
        assert!(CONNECTOR_CACHE.has(&opts));
    }
}
