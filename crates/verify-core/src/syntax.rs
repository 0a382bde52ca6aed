//! Pure, no-I/O syntax validation (C3). Grounded on the RFC-shape and
//! normalization style of `rfc5321::parser`'s `Mailbox`/`ReversePath`
//! types, but reimplemented as a hand-rolled checker rather than a
//! `pest` grammar: this component only ever needs to validate a single
//! address string and report a structured verdict, not parse arbitrary
//! SMTP command grammar.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct SyntaxResult {
    pub is_valid: bool,
    pub local: Option<String>,
    pub domain: Option<String>,
    pub normalized: Option<String>,
    pub error: Option<String>,
}

fn invalid(error: impl Into<String>) -> SyntaxResult {
    SyntaxResult {
        is_valid: false,
        local: None,
        domain: None,
        normalized: None,
        error: Some(error.into()),
    }
}

/// Validates and normalizes a candidate email address string.
///
/// `validate` is idempotent on its own `normalized` output: feeding the
/// normalized form back in yields the same structural result, since
/// normalization is just trim + lowercase and both are no-ops on
/// already-normalized input.
pub fn validate(input: &str) -> SyntaxResult {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return invalid("Invalid email format: address is empty");
    }

    let normalized = trimmed.to_ascii_lowercase();

    if normalized.contains(char::is_whitespace) {
        return invalid("Invalid email format: contains whitespace");
    }

    let at_count = normalized.matches('@').count();
    if at_count != 1 {
        return invalid("Invalid email format: must contain exactly one '@'");
    }

    let (local, domain) = normalized.split_once('@').expect("exactly one '@' checked above");

    if local.is_empty() || domain.is_empty() {
        return invalid("Invalid email format: local or domain part is empty");
    }

    if local.starts_with('"') {
        return invalid("Invalid email format: quoted-string local parts are not supported");
    }

    if local.len() > 64 {
        return invalid("Local part exceeds 64 characters");
    }
    if domain.len() > 253 {
        return invalid("Invalid email format: domain exceeds 253 characters");
    }

    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return invalid("Invalid email format: local part has a leading, trailing, or consecutive dot");
    }
    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return invalid("Invalid email format: domain has a leading, trailing, or consecutive dot");
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return invalid("Invalid email format: domain contains an empty label");
        }
        if label.len() > 63 {
            return invalid("Invalid email format: domain label exceeds 63 characters");
        }
        if label.starts_with('-') || label.ends_with('-') {
            return invalid("Invalid email format: domain label has a leading or trailing hyphen");
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return invalid("Invalid email format: domain label contains an invalid character");
        }
    }

    if !local
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-/=?^_`{|}~.".contains(&b))
    {
        return invalid("Invalid email format: local part contains an invalid character");
    }

    SyntaxResult {
        is_valid: true,
        local: Some(local.to_string()),
        domain: Some(domain.to_string()),
        normalized: Some(normalized.clone()),
        error: None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accepts_simple_address() {
        let r = validate("a@b.co");
        assert!(r.is_valid);
        assert_eq!(r.local.as_deref(), Some("a"));
        assert_eq!(r.domain.as_deref(), Some("b.co"));
    }

    #[test]
    fn rejects_missing_at() {
        let r = validate("invalid-email");
        assert!(!r.is_valid);
        assert!(r.error.unwrap().contains("format"));
    }

    #[test]
    fn normalization_is_idempotent() {
        let r1 = validate("Foo.Bar@EXAMPLE.com");
        let r2 = validate(r1.normalized.as_deref().unwrap());
        assert_eq!(r1.local, r2.local);
        assert_eq!(r1.domain, r2.domain);
        assert_eq!(r1.is_valid, r2.is_valid);
    }

    #[test]
    fn local_part_boundary() {
        let local_64 = "a".repeat(64);
        let local_65 = "a".repeat(65);
        assert!(validate(&format!("{local_64}@example.com")).is_valid);
        let r = validate(&format!("{local_65}@example.com"));
        assert!(!r.is_valid);
        assert_eq!(r.error.as_deref(), Some("Local part exceeds 64 characters"));
    }

    #[test]
    fn domain_length_boundary() {
        // 253 bytes split into legal <=63 byte labels
        let label = "a".repeat(63);
        let domain_253 = format!("{label}.{label}.{label}.{}", "a".repeat(61));
        assert_eq!(domain_253.len(), 253);
        assert!(validate(&format!("user@{domain_253}")).is_valid);

        let domain_254 = format!("{domain_253}a");
        let r = validate(&format!("user@{domain_254}"));
        assert!(!r.is_valid);
        assert!(r.error.unwrap().contains("exceeds 253 characters"));
    }

    #[test]
    fn rejects_consecutive_dots() {
        assert!(!validate("a..b@example.com").is_valid);
        assert!(!validate("a@example..com").is_valid);
    }

    #[test]
    fn rejects_hyphen_at_label_edge() {
        assert!(!validate("a@-example.com").is_valid);
        assert!(!validate("a@example-.com").is_valid);
    }

    #[test]
    fn rejects_quoted_local_part() {
        assert!(!validate("\"quoted\"@example.com").is_valid);
    }

    #[test]
    fn non_string_like_input_is_invalid() {
        let r = validate("");
        assert!(!r.is_valid);
    }
}
