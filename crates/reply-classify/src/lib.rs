//! Converts an SMTP response's code and free-text message into a
//! normalized error taxonomy, grounded on kumomta's `bounce-classify`
//! crate: the same `RegexSet`-over-phrase-rules design, O(1)
//! pattern-to-classification mapping, first-match-wins ordering. Aimed
//! at a reachability-oriented taxonomy rather than kumomta's
//! bounce-handling one, so the rule table and the output enum differ,
//! but the compilation strategy is the teacher's.

use regex::{RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};
use smtp_dialog::Response;
use std::sync::LazyLock;

/// The provider a domain or MX host was classified as, consumed both
/// here (to select provider-specific phrase rules) and by the
/// orchestrator (which re-exports this as its public `ProviderTag`).
#[derive(
    Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, strum::Display,
)]
pub enum Provider {
    Gmail,
    Yahoo,
    HotmailB2C,
    HotmailB2B,
    Proofpoint,
    Mimecast,
    EverythingElse,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, strum::Display)]
pub enum ErrorKind {
    Invalid,
    Disabled,
    FullInbox,
    RateLimited,
    Blocked,
    GreyListed,
    CatchAll,
    ConnectionError,
    Timeout,
    PolicyRejection,
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, strum::Display)]
pub enum Severity {
    Permanent,
    Temporary,
    Unknown,
}

/// The result of classifying a single SMTP response.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Classification {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    pub provider_code: Option<String>,
}

struct Rule {
    provider: Option<Provider>,
    kind: ErrorKind,
    severity: Severity,
    provider_code: Option<&'static str>,
    pattern: &'static str,
}

// Provider-specific rules are listed before the generic ones so that
// first-match-wins in the compiled RegexSet prefers the more precise
// classification, the same ordering guarantee bounce-classify's
// `test_rule_order` exercises.
static RULES: &[Rule] = &[
    Rule { provider: Some(Provider::Gmail), kind: ErrorKind::Disabled, severity: Severity::Permanent, provider_code: Some("GMAIL_DISABLED"), pattern: r"(?i)has been disabled" },
    Rule { provider: Some(Provider::Gmail), kind: ErrorKind::RateLimited, severity: Severity::Temporary, provider_code: Some("GMAIL_RATE_LIMITED"), pattern: r"(?i)421-4\.7\.0|too many (login|messages)" },
    Rule { provider: Some(Provider::Yahoo), kind: ErrorKind::FullInbox, severity: Severity::Permanent, provider_code: Some("YAHOO_FULL"), pattern: r"(?i)mailbox over quota" },
    Rule { provider: Some(Provider::Yahoo), kind: ErrorKind::Blocked, severity: Severity::Temporary, provider_code: Some("YAHOO_REQUEST_REJECTED"), pattern: r"(?i)request rejected" },
    Rule { provider: Some(Provider::HotmailB2B), kind: ErrorKind::PolicyRejection, severity: Severity::Permanent, provider_code: Some("EXCHANGE_RELAY_DENIED"), pattern: r"(?i)relay access denied" },
    Rule { provider: Some(Provider::HotmailB2C), kind: ErrorKind::Blocked, severity: Severity::Temporary, provider_code: Some("HOTMAIL_FREQUENCY_LIMIT"), pattern: r"(?i)frequency limit" },
    Rule { provider: Some(Provider::Proofpoint), kind: ErrorKind::Blocked, severity: Severity::Permanent, provider_code: Some("PROOFPOINT_CONTENT_FILTER"), pattern: r"(?i)content filter" },
    // generic phrase rules, no provider affinity
    Rule { provider: None, kind: ErrorKind::GreyListed, severity: Severity::Temporary, provider_code: None, pattern: r"(?i)greylist|greylisting|try again (later|in a)" },
    Rule { provider: None, kind: ErrorKind::PolicyRejection, severity: Severity::Unknown, provider_code: None, pattern: r"(?i)spam|policy|rbl|blocked" },
    Rule { provider: None, kind: ErrorKind::Disabled, severity: Severity::Permanent, provider_code: None, pattern: r"(?i)disabled|user unknown|no such user|unknown user" },
    Rule { provider: None, kind: ErrorKind::FullInbox, severity: Severity::Permanent, provider_code: None, pattern: r"(?i)mailbox is full|quota exceeded|over quota" },
    Rule { provider: None, kind: ErrorKind::RateLimited, severity: Severity::Temporary, provider_code: None, pattern: r"(?i)rate limit exceeded|too many (connections|requests)" },
    Rule { provider: None, kind: ErrorKind::Blocked, severity: Severity::Unknown, provider_code: None, pattern: r"(?i)relay access denied|access denied|not authorized" },
];

static RULE_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSetBuilder::new(RULES.iter().map(|r| r.pattern))
        .build()
        .expect("all response classification patterns are valid regexes")
});

/// Stateless `(message, provider, code) -> Classification` response
/// interpreter, per spec.md's C6.
pub fn classify(message: &str, provider: Option<Provider>, code: Option<u16>) -> Classification {
    if let Some(idx) = RULE_SET
        .matches(message)
        .into_iter()
        .find(|&idx| RULES[idx].provider.is_none() || RULES[idx].provider == provider)
    {
        let rule = &RULES[idx];
        return Classification {
            kind: rule.kind,
            severity: rule.severity,
            message: message.to_string(),
            provider_code: rule.provider_code.map(str::to_string),
        };
    }

    match code {
        Some(550) => Classification {
            kind: ErrorKind::Disabled,
            severity: Severity::Permanent,
            message: message.to_string(),
            provider_code: None,
        },
        Some(552) => Classification {
            kind: ErrorKind::FullInbox,
            severity: Severity::Permanent,
            message: message.to_string(),
            provider_code: None,
        },
        Some(450) | Some(451) => Classification {
            kind: ErrorKind::RateLimited,
            severity: Severity::Temporary,
            message: message.to_string(),
            provider_code: None,
        },
        _ => Classification {
            kind: ErrorKind::Unknown,
            severity: Severity::Unknown,
            message: message.to_string(),
            provider_code: None,
        },
    }
}

/// Convenience wrapper over [`classify`] that pulls the message and code
/// straight out of an SMTP [`Response`].
pub fn classify_response(response: &Response, provider: Option<Provider>) -> Classification {
    classify(&response.to_single_line(), provider, Some(response.code))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gmail_disabled_takes_priority_over_generic() {
        let c = classify("550 5.2.1 The email account that you tried to reach has been disabled.", Some(Provider::Gmail), Some(550));
        assert_eq!(c.kind, ErrorKind::Disabled);
        assert_eq!(c.provider_code.as_deref(), Some("GMAIL_DISABLED"));
    }

    #[test]
    fn generic_full_inbox_phrase() {
        let c = classify("452 4.2.2 mailbox is full", None, Some(452));
        assert_eq!(c.kind, ErrorKind::FullInbox);
        assert_eq!(c.provider_code, None);
    }

    #[test]
    fn code_based_fallback_for_unmatched_phrase() {
        let c = classify("550 no further detail", None, Some(550));
        assert_eq!(c.kind, ErrorKind::Disabled);
        assert_eq!(c.severity, Severity::Permanent);
    }

    #[test]
    fn fully_unknown_response() {
        let c = classify("211 system status", None, Some(211));
        assert_eq!(c.kind, ErrorKind::Unknown);
        assert_eq!(c.severity, Severity::Unknown);
    }

    #[test]
    fn greylisting_phrase() {
        let c = classify("451 4.7.1 greylisted, try again later", None, Some(451));
        assert_eq!(c.kind, ErrorKind::GreyListed);
    }

    #[test]
    fn provider_specific_rule_does_not_fire_for_other_providers() {
        let c = classify("mailbox over quota", Some(Provider::Gmail), Some(552));
        // the Yahoo-specific rule must not match when the provider differs
        assert_eq!(c.kind, ErrorKind::FullInbox);
        assert_eq!(c.provider_code, None);
    }
}
