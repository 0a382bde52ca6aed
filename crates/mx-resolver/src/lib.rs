//! MX/A resolution with an LRU+TTL cache layer in front of the resolver,
//! grounded on kumomta's `dns-resolver` crate (`MailExchanger::resolve`,
//! the `Resolver` trait, and its `MX_CACHE`). Prometheus instrumentation
//! and the `unbound`/DANE resolution paths are not carried over: this
//! workspace has no counterpart need for them.

mod resolver;

pub use resolver::{HickoryResolver, RawMx, Resolver, TestResolver};

use lru_ttl_cache::LruCacheWithTtl;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DnsError {
    #[error("DNS resolution failed for {0}")]
    ResolveFailed(String),
    #[error("{0} does not exist (NXDOMAIN)")]
    NxDomain(String),
    #[error("{0}: No MX records found")]
    NoMxRecords(String),
    #[error("{0} explicitly accepts no mail (null MX)")]
    NoRoute(String),
}

/// A single MX record, sorted into ascending preference order by
/// [`MxResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub exchange: String,
    pub priority: u16,
}

pub struct MxResolver {
    resolver: Arc<dyn Resolver>,
    cache: LruCacheWithTtl<String, Result<Arc<Vec<MxRecord>>, DnsError>>,
}

impl MxResolver {
    pub fn new(resolver: Arc<dyn Resolver>, max_size: usize, ttl: Duration) -> Self {
        Self {
            resolver,
            cache: LruCacheWithTtl::new_named("mx", max_size, ttl),
        }
    }

    pub fn with_hickory(max_size: usize, ttl: Duration) -> Result<Self, DnsError> {
        Ok(Self::new(
            Arc::new(HickoryResolver::new()?),
            max_size,
            ttl,
        ))
    }

    /// Resolves `domain`'s MX records, sorted ascending by priority.
    ///
    /// An empty MX result is a failure ([`DnsError::NoMxRecords`]) per
    /// the resolver's contract: there is no RFC 5321 §5.1 A-record
    /// fallback here, since this is a reachability check, not a message
    /// router — a domain with no MX is not a usable mail destination. A
    /// "null MX" (RFC 7505: a single record with preference 0 and
    /// exchange `.`) means the domain explicitly accepts no mail,
    /// surfaced here as [`DnsError::NoRoute`].
    pub async fn resolve(&self, domain: &str) -> Result<Arc<Vec<MxRecord>>, DnsError> {
        let key = domain.to_ascii_lowercase();
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("mx cache hit for {domain}");
            return cached;
        }

        let result = self.resolve_uncached(&key).await;
        self.cache.set(key, result.clone());
        result
    }

    async fn resolve_uncached(&self, domain: &str) -> Result<Arc<Vec<MxRecord>>, DnsError> {
        match self.resolver.resolve_mx(domain).await {
            Ok(raw) if raw.is_empty() => Err(DnsError::NoMxRecords(domain.to_string())),
            Ok(raw) => {
                if raw.len() == 1 && raw[0].preference == 0 && raw[0].exchange == "." {
                    return Err(DnsError::NoRoute(domain.to_string()));
                }
                let mut records: Vec<MxRecord> = raw
                    .into_iter()
                    .map(|mx| MxRecord {
                        exchange: mx.exchange,
                        priority: mx.preference,
                    })
                    .collect();
                records.sort_by_key(|r| r.priority);
                Ok(Arc::new(records))
            }
            Err(DnsError::NxDomain(_)) => Err(DnsError::NxDomain(domain.to_string())),
            Err(err) => Err(err),
        }
    }

    pub async fn resolve_ip(&self, host: &str) -> Result<Vec<IpAddr>, DnsError> {
        self.resolver.resolve_ip(host).await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn test_resolver_with_mx() -> MxResolver {
        let resolver = TestResolver::new().with_mx(
            "example.com",
            vec![(10, "mx2.example.com"), (5, "mx1.example.com")],
        );
        MxResolver::new(Arc::new(resolver), 16, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn sorts_by_priority_ascending() {
        let resolver = test_resolver_with_mx();
        let records = resolver.resolve("example.com").await.unwrap();
        assert_eq!(records[0].exchange, "mx1.example.com");
        assert_eq!(records[1].exchange, "mx2.example.com");
    }

    #[tokio::test]
    async fn empty_mx_result_is_a_failure_with_no_a_record_fallback() {
        let resolver = TestResolver::new()
            .with_mx("mx-less.com", vec![])
            .with_a("mx-less.com", vec!["127.0.0.1".parse().unwrap()]);
        let resolver = MxResolver::new(Arc::new(resolver), 16, Duration::from_secs(60));

        // mx-less.com has an A record, but an empty MX result is a
        // failure on its own terms; the A record is never consulted.
        let err = resolver.resolve("mx-less.com").await.unwrap_err();
        assert!(matches!(err, DnsError::NoMxRecords(_)));
    }

    #[tokio::test]
    async fn null_mx_is_no_route() {
        let resolver = TestResolver::new().with_mx("rejects-mail.com", vec![(0, ".")]);
        let resolver = MxResolver::new(Arc::new(resolver), 16, Duration::from_secs(60));
        let err = resolver.resolve("rejects-mail.com").await.unwrap_err();
        assert!(matches!(err, DnsError::NoRoute(_)));
    }

    #[tokio::test]
    async fn nxdomain_propagates() {
        let resolver = TestResolver::new();
        let resolver = MxResolver::new(Arc::new(resolver), 16, Duration::from_secs(60));
        let err = resolver.resolve("nonexistent.invalid").await.unwrap_err();
        assert!(matches!(err, DnsError::NxDomain(_)));
    }

    #[tokio::test]
    async fn caches_result_across_calls() {
        let resolver = test_resolver_with_mx();
        let first = resolver.resolve("example.com").await.unwrap();
        let second = resolver.resolve("example.com").await.unwrap();
        assert_eq!(first, second);
    }
}
