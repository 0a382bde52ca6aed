//! Namespace wiring for the cache substrate (C1). Each namespace named
//! in spec.md §4.1 gets its own [`LruCacheWithTtl`] instance with an
//! independent size/TTL, mirroring how kumomta instantiates a distinct
//! named cache per concern (`dns_resolver_mx`, `dns_resolver_ipv4`, ...)
//! rather than sharing one cache keyed by a composite key. The `mx`
//! namespace itself lives inside [`mx_resolver::MxResolver`]; this
//! struct owns the namespaces that are this crate's concern. There is
//! no `syntax`/`domainValid` namespace here: C3 is pure and no-I/O (see
//! `syntax.rs`), so it has nothing cacheable to hold.
use crate::outcome::Tri;
use lru_ttl_cache::LruCacheWithTtl;
use reply_classify::ErrorKind;
use std::time::Duration;

/// Per-namespace `(max_size, ttl)`. Concrete values are a deployment
/// decision deferred by spec.md §4.1; these are this library's defaults,
/// overridable via [`crate::VerifyOptions`].
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub mx: (usize, Duration),
    pub smtp: (usize, Duration),
    pub smtp_port: (usize, Duration),
    pub disposable: (usize, Duration),
    pub free: (usize, Duration),
    pub domain_suggestion: (usize, Duration),
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mx: (8192, Duration::from_secs(300)),
            smtp: (4096, Duration::from_secs(600)),
            smtp_port: (4096, Duration::from_secs(3600)),
            disposable: (16384, Duration::from_secs(86400)),
            free: (16384, Duration::from_secs(86400)),
            domain_suggestion: (1024, Duration::from_secs(3600)),
        }
    }
}

/// The cached shape of an SMTP probe verdict (the `smtp` namespace),
/// keyed by the full `local@domain` target. Bundles what `DialogOutcome`
/// doesn't carry on its own — `is_catch_all`, the port the dialog
/// actually used — so a cache hit can stand in for a fresh dialog
/// without re-running it.
#[derive(Debug, Clone, Copy)]
pub struct SmtpVerdict {
    pub deliverable: Tri,
    pub classification: ErrorKind,
    pub is_catch_all: bool,
    pub port: Option<u16>,
}

pub struct Caches {
    pub smtp: LruCacheWithTtl<String, SmtpVerdict>,
    pub smtp_port: LruCacheWithTtl<String, u16>,
    pub disposable: LruCacheWithTtl<String, bool>,
    pub free: LruCacheWithTtl<String, bool>,
    pub domain_suggestion: LruCacheWithTtl<String, Option<String>>,
}

impl Caches {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            smtp: LruCacheWithTtl::new_named("smtp", config.smtp.0, config.smtp.1),
            smtp_port: LruCacheWithTtl::new_named("smtp_port", config.smtp_port.0, config.smtp_port.1),
            disposable: LruCacheWithTtl::new_named("disposable", config.disposable.0, config.disposable.1),
            free: LruCacheWithTtl::new_named("free", config.free.0, config.free.1),
            domain_suggestion: LruCacheWithTtl::new_named(
                "domain_suggestion",
                config.domain_suggestion.0,
                config.domain_suggestion.1,
            ),
        }
    }

    /// The best port to try first for `domain`, if a previous
    /// verification recorded one (C9). Soft state: a stale or missing
    /// entry only costs one extra retry against the configured port list.
    pub fn preferred_port(&self, domain: &str) -> Option<u16> {
        self.smtp_port.get(&domain.to_ascii_lowercase())
    }

    pub fn record_successful_port(&self, domain: &str, port: u16) {
        self.smtp_port.set(domain.to_ascii_lowercase(), port);
    }

    pub fn cached_smtp_verdict(&self, target: &str) -> Option<SmtpVerdict> {
        self.smtp.get(&target.to_ascii_lowercase())
    }

    pub fn record_smtp_verdict(&self, target: &str, verdict: SmtpVerdict) {
        self.smtp.set(target.to_ascii_lowercase(), verdict);
    }

    pub fn cached_disposable(&self, domain: &str) -> Option<bool> {
        self.disposable.get(&domain.to_ascii_lowercase())
    }

    pub fn record_disposable(&self, domain: &str, is_disposable: bool) {
        self.disposable.set(domain.to_ascii_lowercase(), is_disposable);
    }

    pub fn cached_free(&self, domain: &str) -> Option<bool> {
        self.free.get(&domain.to_ascii_lowercase())
    }

    pub fn record_free(&self, domain: &str, is_free: bool) {
        self.free.set(domain.to_ascii_lowercase(), is_free);
    }

    pub fn cached_domain_suggestion(&self, domain: &str) -> Option<Option<String>> {
        self.domain_suggestion.get(&domain.to_ascii_lowercase())
    }

    pub fn record_domain_suggestion(&self, domain: &str, suggestion: Option<String>) {
        self.domain_suggestion.set(domain.to_ascii_lowercase(), suggestion);
    }
}
