//! Public API surface (C10): `verify_one`, `verify_batch`, and the
//! collaborator-backed lookups `is_disposable`/`is_free`/`suggest_domain`,
//! plus the option/result types every caller needs. Internal modules are
//! deliberately not re-exported wholesale — callers depend on this
//! surface, not on `engine`/`probes`/etc. directly, the way kumomta's
//! top-level crates expose a narrow public API over their internal
//! machinery.

mod cache;
mod collaborators;
mod engine;
mod orchestrator;
mod outcome;
mod probes;
mod provider;
mod syntax;

pub use collaborators::{DomainListLookup, NameSpamDetector, TypoSuggester};
pub use orchestrator::{
    MiscResult, MxResult, Reachable, SmtpOptions, SmtpResult, VerificationResult, VerifyEngine, VerifyOptions,
    YahooApiOptions,
};
pub use outcome::{Sequence, SmtpStep, Tri};
pub use provider::ProviderTag;
pub use reply_classify::ErrorKind;
pub use syntax::SyntaxResult;

/// Convenience wrapper for a one-off verification with default options.
pub async fn verify_one(email: &str, options: &VerifyOptions) -> VerificationResult {
    VerifyEngine::new().verify_one(email, options).await
}

/// Convenience wrapper for a batch verification with default options
/// and the default `batchSize` of 10.
pub async fn verify_batch(emails: &[String], options: &VerifyOptions) -> Vec<VerificationResult> {
    VerifyEngine::new().verify_batch(emails, options, 10).await
}

/// Checks `domain` against the curated disposable-mailbox list, without
/// running a full verification.
pub fn is_disposable(domain: &str) -> bool {
    collaborators::StaticDomainList::disposable_defaults().contains(domain)
}

/// Checks `domain` against the curated free-consumer-provider list.
pub fn is_free(domain: &str) -> bool {
    collaborators::StaticDomainList::free_defaults().contains(domain)
}

/// Suggests a likely-intended domain for a typo'd `domain`, if one of
/// the curated popular domains is within edit distance 1.
pub fn suggest_domain(domain: &str) -> Option<String> {
    use collaborators::TypoSuggester;
    collaborators::KnownDomainTypoSuggester::default().suggest(domain)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disposable_and_free_lookups_are_independent() {
        assert!(is_disposable("mailinator.com"));
        assert!(!is_disposable("gmail.com"));
        assert!(is_free("gmail.com"));
        assert!(!is_free("mailinator.com"));
    }

    #[test]
    fn suggest_domain_catches_a_common_typo() {
        assert_eq!(suggest_domain("gmial.com"), Some("gmail.com".to_string()));
        assert_eq!(suggest_domain("gmail.com"), None);
    }

    #[tokio::test]
    async fn verify_one_reports_unknown_without_network_checks() {
        let mut options = VerifyOptions::default();
        options.verify_mx = false;
        options.verify_smtp = false;
        let result = verify_one("someone@example.com", &options).await;
        assert_eq!(result.reachable, Reachable::Unknown);
        assert!(result.syntax.is_valid);
    }
}
