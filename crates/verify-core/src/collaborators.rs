//! Collaborator seams (C8 supporting cast): typo suggestion, disposable/
//! free domain lookups, and the spam-name heuristic are named by
//! spec.md §1 as out-of-scope external collaborators — "pluggable,
//! contract named, internals unspecified". This module defines those
//! contracts as traits plus a minimal reference implementation of each,
//! the way the teacher treats `dns_resolver`/`kumo_dns_resolver` as a
//! swappable trait behind a default production implementation.

use std::collections::HashSet;

/// Edit-distance domain correction (e.g. `gmial.com` -> `gmail.com`).
pub trait TypoSuggester: Send + Sync {
    fn suggest(&self, domain: &str) -> Option<String>;
}

/// A curated list of known domains (disposable mailbox providers, or
/// free consumer providers), checked by exact match.
pub trait DomainListLookup: Send + Sync {
    fn contains(&self, domain: &str) -> bool;
}

/// Flags a local part that reads as a randomly-generated string rather
/// than a human name, by character-class distribution.
pub trait NameSpamDetector: Send + Sync {
    fn looks_like_spam(&self, local_part: &str) -> bool;
}

/// Edit-distance-1 suggester over a small curated set of popular
/// domains. A production deployment would plug in a larger dictionary
/// and a tuned distance threshold; this is the reference contract
/// implementation, not a claim of completeness.
pub struct KnownDomainTypoSuggester {
    candidates: Vec<&'static str>,
    max_distance: usize,
}

impl Default for KnownDomainTypoSuggester {
    fn default() -> Self {
        Self {
            candidates: vec![
                "gmail.com",
                "yahoo.com",
                "hotmail.com",
                "outlook.com",
                "icloud.com",
                "aol.com",
                "live.com",
                "msn.com",
            ],
            max_distance: 1,
        }
    }
}

impl TypoSuggester for KnownDomainTypoSuggester {
    fn suggest(&self, domain: &str) -> Option<String> {
        if self.candidates.contains(&domain) {
            return None;
        }
        self.candidates
            .iter()
            .map(|candidate| (candidate, levenshtein(domain, candidate)))
            .filter(|(_, distance)| *distance <= self.max_distance && *distance > 0)
            .min_by_key(|(_, distance)| *distance)
            .map(|(candidate, _)| candidate.to_string())
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cur = row[j + 1];
            row[j + 1] = if ca == cb {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j + 1])
            };
            prev = cur;
        }
    }
    row[b.len()]
}

/// A fixed in-memory set, standing in for whatever curated list a
/// deployment loads disposable/free domains from.
pub struct StaticDomainList {
    domains: HashSet<String>,
}

impl StaticDomainList {
    pub fn new(domains: impl IntoIterator<Item = &'static str>) -> Self {
        Self { domains: domains.into_iter().map(str::to_string).collect() }
    }

    pub fn disposable_defaults() -> Self {
        Self::new([
            "mailinator.com",
            "guerrillamail.com",
            "10minutemail.com",
            "tempmail.com",
            "throwawaymail.com",
            "yopmail.com",
        ])
    }

    pub fn free_defaults() -> Self {
        Self::new([
            "gmail.com",
            "yahoo.com",
            "hotmail.com",
            "outlook.com",
            "aol.com",
            "icloud.com",
            "live.com",
            "msn.com",
            "protonmail.com",
        ])
    }
}

impl DomainListLookup for StaticDomainList {
    fn contains(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }
}

/// Flags local parts whose character-class distribution looks more
/// like a generated token than a human name: long runs of digits, no
/// vowels across a long alphabetic run, or a high ratio of digits to
/// letters.
pub struct HeuristicNameSpamDetector;

impl NameSpamDetector for HeuristicNameSpamDetector {
    fn looks_like_spam(&self, local_part: &str) -> bool {
        let letters = local_part.chars().filter(|c| c.is_ascii_alphabetic()).count();
        let digits = local_part.chars().filter(|c| c.is_ascii_digit()).count();
        let vowels = local_part
            .chars()
            .filter(|c| matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'))
            .count();

        if local_part.len() < 6 {
            return false;
        }
        if digits > 0 && letters > 0 && digits as f64 / (letters + digits) as f64 > 0.4 {
            return true;
        }
        letters >= 8 && vowels == 0
    }
}

const ROLE_ACCOUNT_LOCAL_PARTS: &[&str] = &[
    "admin", "info", "support", "sales", "contact", "webmaster", "postmaster", "abuse", "noreply", "no-reply",
];

/// Informational only (spec.md §GLOSSARY "Role account"): never changes
/// the reachability verdict, only annotates the result.
pub fn is_role_account(local_part: &str) -> bool {
    ROLE_ACCOUNT_LOCAL_PARTS.contains(&local_part.to_ascii_lowercase().as_str())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn suggests_close_typo() {
        let suggester = KnownDomainTypoSuggester::default();
        assert_eq!(suggester.suggest("gmial.com"), Some("gmail.com".to_string()));
    }

    #[test]
    fn does_not_suggest_for_known_domain() {
        let suggester = KnownDomainTypoSuggester::default();
        assert_eq!(suggester.suggest("gmail.com"), None);
    }

    #[test]
    fn does_not_suggest_beyond_threshold() {
        let suggester = KnownDomainTypoSuggester::default();
        assert_eq!(suggester.suggest("totallydifferentdomain.net"), None);
    }

    #[test]
    fn disposable_list_matches_known_entries() {
        let list = StaticDomainList::disposable_defaults();
        assert!(list.contains("mailinator.com"));
        assert!(!list.contains("gmail.com"));
    }

    #[test]
    fn free_list_matches_known_entries() {
        let list = StaticDomainList::free_defaults();
        assert!(list.contains("gmail.com"));
        assert!(!list.contains("mycompany.com"));
    }

    #[test]
    fn flags_digit_heavy_local_part_as_spam_like() {
        let detector = HeuristicNameSpamDetector;
        assert!(detector.looks_like_spam("xk2891mz019"));
    }

    #[test]
    fn does_not_flag_ordinary_name() {
        let detector = HeuristicNameSpamDetector;
        assert!(!detector.looks_like_spam("jane.doe"));
    }

    #[test]
    fn detects_role_accounts() {
        assert!(is_role_account("admin"));
        assert!(is_role_account("NoReply"));
        assert!(!is_role_account("jane.doe"));
    }
}
