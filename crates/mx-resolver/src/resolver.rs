use crate::DnsError;
use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioResolver;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// A raw (unsorted, uncached) MX record as returned by a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMx {
    pub exchange: String,
    pub preference: u16,
}

/// Abstracts DNS resolution so that the orchestrator can be driven by a
/// deterministic test double instead of the live network, the same role
/// `dns_resolver::Resolver` plays for kumomta.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<RawMx>, DnsError>;
    async fn resolve_ip(&self, host: &str) -> Result<Vec<IpAddr>, DnsError>;
}

/// Production resolver backed by `hickory-resolver`, reading the system's
/// `/etc/resolv.conf` (or platform equivalent) the way `dns_resolver::HickoryResolver`
/// does.
pub struct HickoryResolver {
    inner: TokioResolver,
}

impl HickoryResolver {
    pub fn new() -> Result<Self, DnsError> {
        let inner = TokioResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Ok(Self { inner })
    }

    pub fn with_config(config: ResolverConfig, opts: ResolverOpts) -> Self {
        Self {
            inner: TokioResolver::tokio(config, opts),
        }
    }
}

#[async_trait]
impl Resolver for HickoryResolver {
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<RawMx>, DnsError> {
        let lookup = self
            .inner
            .mx_lookup(domain)
            .await
            .map_err(|e| DnsError::ResolveFailed(format!("{domain}: {e}")))?;

        Ok(lookup
            .iter()
            .map(|mx| RawMx {
                exchange: mx.exchange().to_utf8().trim_end_matches('.').to_string(),
                preference: mx.preference(),
            })
            .collect())
    }

    async fn resolve_ip(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        let lookup = self
            .inner
            .lookup_ip(host)
            .await
            .map_err(|e| DnsError::ResolveFailed(format!("{host}: {e}")))?;
        Ok(lookup.iter().collect())
    }
}

/// A deterministic test double, grounded on `dns_resolver::TestResolver`:
/// built from zone data instead of querying the network.
#[derive(Default)]
pub struct TestResolver {
    mx: BTreeMap<String, Vec<RawMx>>,
    a: BTreeMap<String, Vec<IpAddr>>,
}

impl TestResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mx(mut self, domain: &str, records: Vec<(u16, &str)>) -> Self {
        self.mx.insert(
            domain.to_ascii_lowercase(),
            records
                .into_iter()
                .map(|(preference, exchange)| RawMx {
                    exchange: exchange.to_string(),
                    preference,
                })
                .collect(),
        );
        self
    }

    pub fn with_a(mut self, host: &str, addrs: Vec<IpAddr>) -> Self {
        self.a.insert(host.to_ascii_lowercase(), addrs);
        self
    }
}

#[async_trait]
impl Resolver for TestResolver {
    async fn resolve_mx(&self, domain: &str) -> Result<Vec<RawMx>, DnsError> {
        self.mx
            .get(&domain.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| DnsError::NxDomain(domain.to_string()))
    }

    async fn resolve_ip(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        self.a
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| DnsError::NxDomain(host.to_string()))
    }
}
