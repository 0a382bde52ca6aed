//! The orchestrator (C8): composes syntax validation, typo suggestion,
//! MX resolution, SMTP/provider-probe dispatch, and the collaborator
//! checks into a single verdict. Grounded on how kumomta's top-level
//! `EgressPool`/queue manager owns and sequences its components rather
//! than any single teacher file, since this composition root has no
//! direct analogue in the teacher's message-sending pipeline.

use crate::cache::{CacheConfig, Caches, SmtpVerdict};
use crate::collaborators::{
    is_role_account, DomainListLookup, HeuristicNameSpamDetector, KnownDomainTypoSuggester,
    NameSpamDetector, StaticDomainList, TypoSuggester,
};
use crate::engine::{self, DialogOptions};
use crate::outcome::{Sequence, Tri};
use crate::probes::{self, ReqwestYahooTransport};
use crate::provider::{self, ProviderTag};
use crate::syntax::{self, SyntaxResult};
use futures::stream::StreamExt;
use mx_resolver::{MxResolver, Resolver};
use reply_classify::ErrorKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Reachable {
    Safe,
    Risky,
    Invalid,
    Unknown,
}

#[derive(Debug, Serialize, Clone)]
pub struct MxResult {
    pub success: bool,
    pub exchanges: Vec<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct SmtpResult {
    pub deliverable: Tri,
    pub kind: ErrorKind,
    pub is_catch_all: bool,
    pub port: Option<u16>,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct MiscResult {
    pub domain_suggestion: Option<String>,
    pub is_disposable: Option<bool>,
    pub is_free: Option<bool>,
    pub is_role_account: Option<bool>,
    pub is_spam_like_name: Option<bool>,
}

#[derive(Debug, Serialize, Clone)]
pub struct VerificationResult {
    pub email: String,
    pub reachable: Reachable,
    pub syntax: SyntaxResult,
    pub provider: Option<ProviderTag>,
    pub mx: Option<MxResult>,
    pub smtp: Option<SmtpResult>,
    pub misc: Option<MiscResult>,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmtpOptions {
    pub ports: Vec<u16>,
    pub timeout: Duration,
    pub max_retries: u8,
    pub tls_enabled: bool,
    pub hostname: String,
    pub use_vrfy: bool,
    pub cache: bool,
    pub sequence: Sequence,
}

impl Default for SmtpOptions {
    fn default() -> Self {
        Self {
            ports: vec![25, 587, 465],
            timeout: Duration::from_millis(3000),
            max_retries: 1,
            tls_enabled: true,
            hostname: "localhost".to_string(),
            use_vrfy: true,
            cache: true,
            sequence: Sequence::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct YahooApiOptions {
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub verify_mx: bool,
    pub verify_smtp: bool,
    pub smtp_options: SmtpOptions,
    pub yahoo_api_options: YahooApiOptions,
    pub check_disposable: bool,
    pub check_free: bool,
    pub suggest_domain: bool,
    pub detect_name: bool,
    pub enable_provider_optimizations: bool,
    pub timeout: Duration,
    pub debug: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            verify_mx: true,
            verify_smtp: false,
            smtp_options: SmtpOptions::default(),
            yahoo_api_options: YahooApiOptions::default(),
            check_disposable: false,
            check_free: false,
            suggest_domain: false,
            detect_name: false,
            enable_provider_optimizations: false,
            timeout: Duration::from_secs(10),
            debug: false,
        }
    }
}

pub struct VerifyEngine {
    resolver: MxResolver,
    caches: Caches,
    typo_suggester: Box<dyn TypoSuggester>,
    disposable: Box<dyn DomainListLookup>,
    free: Box<dyn DomainListLookup>,
    spam_detector: Box<dyn NameSpamDetector>,
}

impl Default for VerifyEngine {
    fn default() -> Self {
        let config = CacheConfig::default();
        Self {
            resolver: MxResolver::with_hickory(config.mx.0, config.mx.1)
                .expect("hickory resolver construction is infallible"),
            caches: Caches::new(&config),
            typo_suggester: Box::new(KnownDomainTypoSuggester::default()),
            disposable: Box::new(StaticDomainList::disposable_defaults()),
            free: Box::new(StaticDomainList::free_defaults()),
            spam_detector: Box::new(HeuristicNameSpamDetector),
        }
    }
}

impl VerifyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: Arc<dyn Resolver>) -> Self {
        let config = CacheConfig::default();
        Self {
            resolver: MxResolver::new(resolver, config.mx.0, config.mx.1),
            caches: Caches::new(&config),
            typo_suggester: Box::new(KnownDomainTypoSuggester::default()),
            disposable: Box::new(StaticDomainList::disposable_defaults()),
            free: Box::new(StaticDomainList::free_defaults()),
            spam_detector: Box::new(HeuristicNameSpamDetector),
        }
    }

    pub async fn verify_one(&self, email: &str, options: &VerifyOptions) -> VerificationResult {
        let start = Instant::now();
        let syntax = syntax::validate(email);
        if !syntax.is_valid {
            return invalid_result(email, syntax, start);
        }

        let local = syntax.local.clone().unwrap_or_default();
        let domain = syntax.domain.clone().unwrap_or_default();

        let mut misc = MiscResult::default();
        if options.suggest_domain {
            misc.domain_suggestion = self.suggest_domain_cached(&domain);
        }

        let mut provider = provider::classify_domain(&domain, None);

        let mut mx_result = None;
        let mut mx_exchange: Option<String> = None;
        if options.verify_mx {
            match self.resolver.resolve(&domain).await {
                Ok(records) if !records.is_empty() => {
                    mx_exchange = Some(records[0].exchange.clone());
                    provider = provider::classify_domain(&domain, mx_exchange.as_deref());
                    mx_result = Some(MxResult {
                        success: true,
                        exchanges: records.iter().map(|r| r.exchange.clone()).collect(),
                    });
                }
                _ => {
                    mx_result = Some(MxResult { success: false, exchanges: Vec::new() });
                    return VerificationResult {
                        email: email.to_string(),
                        reachable: Reachable::Invalid,
                        syntax,
                        provider: Some(provider),
                        mx: mx_result,
                        smtp: None,
                        misc: Some(misc),
                        duration_ms: elapsed_ms(start),
                        error: None,
                    };
                }
            }
        }

        let mut smtp_result = None;
        if options.verify_smtp {
            let use_yahoo_probe =
                options.enable_provider_optimizations && options.yahoo_api_options.enabled && provider == ProviderTag::Yahoo;

            let outcome = if use_yahoo_probe {
                self.run_yahoo_probe(&local, &domain).await
            } else {
                let host = mx_exchange.clone().unwrap_or_else(|| domain.clone());
                self.run_smtp(&host, &domain, &local, options).await
            };

            smtp_result = Some(SmtpResult {
                deliverable: outcome.deliverable,
                kind: outcome.classification,
                is_catch_all: outcome.is_catch_all,
                port: outcome.port,
            });
        }

        if options.check_disposable {
            misc.is_disposable = Some(self.is_disposable_cached(&domain));
        }
        if options.check_free {
            misc.is_free = Some(self.is_free_cached(&domain));
        }
        if options.detect_name {
            misc.is_role_account = Some(is_role_account(&local));
            misc.is_spam_like_name = Some(self.spam_detector.looks_like_spam(&local));
        }

        let reachable = compute_reachable(&smtp_result, misc.is_disposable.unwrap_or(false));

        VerificationResult {
            email: email.to_string(),
            reachable,
            syntax,
            provider: Some(provider),
            mx: mx_result,
            smtp: smtp_result,
            misc: Some(misc),
            duration_ms: elapsed_ms(start),
            error: None,
        }
    }

    async fn run_smtp(&self, host: &str, domain: &str, local: &str, options: &VerifyOptions) -> SmtpProbeResult {
        let target = format!("{local}@{domain}");
        let smtp_opts = &options.smtp_options;

        if smtp_opts.cache {
            if let Some(verdict) = self.caches.cached_smtp_verdict(&target) {
                tracing::debug!("smtp cache hit for {target}");
                return SmtpProbeResult {
                    deliverable: verdict.deliverable,
                    classification: verdict.classification,
                    is_catch_all: verdict.is_catch_all,
                    port: verdict.port,
                };
            }
        }

        let mut ports = smtp_opts.ports.clone();
        if smtp_opts.cache {
            if let Some(preferred) = self.caches.preferred_port(domain) {
                if let Some(pos) = ports.iter().position(|p| *p == preferred) {
                    ports.swap(0, pos);
                }
            }
        }

        let dialog_options = DialogOptions {
            hostname: smtp_opts.hostname.clone(),
            use_vrfy: smtp_opts.use_vrfy,
            per_step_timeout: smtp_opts.timeout,
            max_retries: smtp_opts.max_retries,
        };

        let (outcome, port) = engine::run(host, &target, &ports, &smtp_opts.sequence, &dialog_options).await;

        if outcome.connected && smtp_opts.cache {
            if let Some(port) = port {
                self.caches.record_successful_port(domain, port);
            }
        }

        let is_catch_all = if matches!(outcome.deliverable, Tri::Yes) {
            self.probe_catch_all(host, domain, &smtp_opts.sequence, &dialog_options, &ports, port)
                .await
        } else {
            false
        };

        if smtp_opts.cache {
            self.caches.record_smtp_verdict(
                &target,
                SmtpVerdict {
                    deliverable: outcome.deliverable,
                    classification: outcome.classification,
                    is_catch_all,
                    port,
                },
            );
        }

        SmtpProbeResult {
            deliverable: outcome.deliverable,
            classification: outcome.classification,
            is_catch_all,
            port,
        }
    }

    fn suggest_domain_cached(&self, domain: &str) -> Option<String> {
        if let Some(cached) = self.caches.cached_domain_suggestion(domain) {
            return cached;
        }
        let suggestion = self.typo_suggester.suggest(domain);
        self.caches.record_domain_suggestion(domain, suggestion.clone());
        suggestion
    }

    fn is_disposable_cached(&self, domain: &str) -> bool {
        if let Some(cached) = self.caches.cached_disposable(domain) {
            return cached;
        }
        let is_disposable = self.disposable.contains(domain);
        self.caches.record_disposable(domain, is_disposable);
        is_disposable
    }

    fn is_free_cached(&self, domain: &str) -> bool {
        if let Some(cached) = self.caches.cached_free(domain) {
            return cached;
        }
        let is_free = self.free.contains(domain);
        self.caches.record_free(domain, is_free);
        is_free
    }

    /// Repeats the RCPT TO check with a random local part (spec §4.5's
    /// optional catch-all probe). A second accept means the domain
    /// swallows everything, so the earlier accept proves nothing.
    async fn probe_catch_all(
        &self,
        host: &str,
        domain: &str,
        sequence: &Sequence,
        dialog_options: &DialogOptions,
        ports: &[u16],
        preferred_port: Option<u16>,
    ) -> bool {
        let probe_ports: Vec<u16> = match preferred_port {
            Some(p) => vec![p],
            None => ports.to_vec(),
        };
        let random_local = engine::random_catch_all_local_part();
        let target = format!("{random_local}@{domain}");
        let (outcome, _) = engine::run(host, &target, &probe_ports, sequence, dialog_options).await;
        matches!(outcome.deliverable, Tri::Yes)
    }

    async fn run_yahoo_probe(&self, local: &str, domain: &str) -> SmtpProbeResult {
        let transport = match ReqwestYahooTransport::new(Duration::from_secs(10)) {
            Ok(transport) => transport,
            Err(_) => {
                return SmtpProbeResult {
                    deliverable: Tri::Unknown,
                    classification: ErrorKind::ConnectionError,
                    is_catch_all: false,
                    port: None,
                }
            }
        };
        let outcome = probes::probe_yahoo(&transport, local, domain).await;
        // The probe contract (spec.md §4.7) only has isValid/isDeliverable/
        // error, no ErrorKind taxonomy; Unknown is the honest default here.
        SmtpProbeResult {
            deliverable: if outcome.is_deliverable { Tri::Yes } else { Tri::No },
            classification: ErrorKind::Unknown,
            is_catch_all: false,
            port: None,
        }
    }

    /// Verifies every address in `emails` concurrently, bounded to
    /// `batch_size` in-flight dialogs at once (spec.md §4.8: default 10,
    /// hard ceiling 100). `buffered` preserves input order while still
    /// overlapping I/O across addresses.
    pub async fn verify_batch(&self, emails: &[String], options: &VerifyOptions, batch_size: usize) -> Vec<VerificationResult> {
        let batch_size = batch_size.clamp(1, 100);
        futures::stream::iter(emails.iter().map(|email| self.verify_one(email, options)))
            .buffered(batch_size)
            .collect()
            .await
    }
}

struct SmtpProbeResult {
    deliverable: Tri,
    classification: ErrorKind,
    is_catch_all: bool,
    port: Option<u16>,
}

fn compute_reachable(smtp: &Option<SmtpResult>, is_disposable: bool) -> Reachable {
    match smtp {
        None => Reachable::Unknown,
        Some(result) => match result.deliverable {
            Tri::Yes if !result.is_catch_all && !is_disposable => Reachable::Safe,
            Tri::Yes => Reachable::Risky,
            Tri::No if matches!(result.kind, ErrorKind::FullInbox) => Reachable::Risky,
            Tri::No => Reachable::Invalid,
            Tri::Unknown => Reachable::Unknown,
        },
    }
}

fn invalid_result(email: &str, syntax: SyntaxResult, start: Instant) -> VerificationResult {
    VerificationResult {
        email: email.to_string(),
        reachable: Reachable::Invalid,
        syntax,
        provider: None,
        mx: None,
        smtp: None,
        misc: None,
        duration_ms: elapsed_ms(start),
        error: None,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn short_circuits_on_invalid_syntax() {
        let engine = VerifyEngine::with_resolver(Arc::new(mx_resolver::TestResolver::default()));
        let result = engine.verify_one("not-an-email", &VerifyOptions::default()).await;
        assert_eq!(result.reachable, Reachable::Invalid);
        assert!(!result.syntax.is_valid);
        assert!(result.mx.is_none());
        assert!(result.smtp.is_none());
    }

    #[tokio::test]
    async fn skips_smtp_when_mx_is_empty() {
        let resolver = mx_resolver::TestResolver::default().with_mx("no-mx.example", vec![]);
        let engine = VerifyEngine::with_resolver(Arc::new(resolver));
        let mut options = VerifyOptions::default();
        options.verify_mx = true;
        options.verify_smtp = true;
        let result = engine.verify_one("test@no-mx.example", &options).await;
        assert_eq!(result.reachable, Reachable::Invalid);
        assert_eq!(result.mx.as_ref().map(|m| m.success), Some(false));
        assert!(result.smtp.is_none());
    }

    #[tokio::test]
    async fn unknown_when_mx_and_smtp_both_disabled() {
        let engine = VerifyEngine::with_resolver(Arc::new(mx_resolver::TestResolver::default()));
        let mut options = VerifyOptions::default();
        options.verify_mx = false;
        options.verify_smtp = false;
        let result = engine.verify_one("a@b.co", &options).await;
        assert_eq!(result.reachable, Reachable::Unknown);
        assert_eq!(result.syntax.local.as_deref(), Some("a"));
        assert_eq!(result.syntax.domain.as_deref(), Some("b.co"));
        assert!(result.mx.is_none());
        assert!(result.smtp.is_none());
    }
}
