//! Maps a normalized domain (and optionally its MX exchange) to a
//! [`ProviderTag`] (C4). Grounded on `dns_resolver`'s own MX-hostname
//! pattern matching for Microsoft/Proofpoint/Mimecast (`*.protection.outlook.com`,
//! `pphosted.com`, `*.mimecast.com`) seen throughout the teacher's
//! `dns-resolver` and `mta-sts` crates, but driven by curated suffix
//! sets rather than DNS-side special-casing.

pub use reply_classify::Provider as ProviderTag;

const GMAIL: &[&str] = &["gmail.com", "googlemail.com"];
const YAHOO_SUFFIXES: &[&str] = &["yahoo.", "ymail.", "rocketmail.com"];
const HOTMAIL_B2C_SUFFIXES: &[&str] = &["hotmail.", "outlook.", "live.", "msn.com"];

fn matches_suffix_family(domain: &str, family: &[&str]) -> bool {
    family.iter().any(|pattern| {
        if let Some(prefix) = pattern.strip_suffix('.') {
            domain == *pattern.trim_end_matches('.') || domain.starts_with(&format!("{prefix}."))
        } else {
            domain == *pattern
        }
    })
}

/// Classifies a domain into a [`ProviderTag`]. Subdomains of well-known
/// providers do NOT inherit the parent's tag: only an exact match (or,
/// for the wildcard families, a same-TLD-family match like `yahoo.co.uk`)
/// counts, so `mail.gmail.com` classifies as `EverythingElse`.
pub fn classify_domain(domain: &str, mx_exchange: Option<&str>) -> ProviderTag {
    let domain = domain.to_ascii_lowercase();

    if GMAIL.contains(&domain.as_str()) {
        return ProviderTag::Gmail;
    }
    if matches_suffix_family(&domain, YAHOO_SUFFIXES) {
        return ProviderTag::Yahoo;
    }
    if matches_suffix_family(&domain, HOTMAIL_B2C_SUFFIXES) {
        return ProviderTag::HotmailB2C;
    }

    if let Some(mx) = mx_exchange {
        let mx = mx.to_ascii_lowercase();
        if mx.ends_with("-com.olc.protection.outlook.com") || mx.ends_with(".mail.protection.outlook.com") {
            return ProviderTag::HotmailB2B;
        }
        if mx.contains("pphosted.com") || mx.contains("ppe-hosted.com") {
            return ProviderTag::Proofpoint;
        }
        if mx.ends_with(".mimecast.com") {
            return ProviderTag::Mimecast;
        }
    }

    ProviderTag::EverythingElse
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_gmail() {
        assert_eq!(classify_domain("gmail.com", None), ProviderTag::Gmail);
        assert_eq!(classify_domain("googlemail.com", None), ProviderTag::Gmail);
    }

    #[test]
    fn subdomains_do_not_inherit() {
        assert_eq!(classify_domain("mail.gmail.com", None), ProviderTag::EverythingElse);
    }

    #[test]
    fn classifies_yahoo_family() {
        assert_eq!(classify_domain("yahoo.com", None), ProviderTag::Yahoo);
        assert_eq!(classify_domain("yahoo.co.uk", None), ProviderTag::Yahoo);
        assert_eq!(classify_domain("ymail.com", None), ProviderTag::Yahoo);
        assert_eq!(classify_domain("rocketmail.com", None), ProviderTag::Yahoo);
    }

    #[test]
    fn classifies_hotmail_b2b_from_mx() {
        assert_eq!(
            classify_domain("contoso.com", Some("contoso-com.olc.protection.outlook.com")),
            ProviderTag::HotmailB2B
        );
    }

    #[test]
    fn classifies_proofpoint_and_mimecast_from_mx() {
        assert_eq!(
            classify_domain("example.com", Some("mx1.example.com.pphosted.com")),
            ProviderTag::Proofpoint
        );
        assert_eq!(
            classify_domain("example.com", Some("example-com.mimecast.com")),
            ProviderTag::Mimecast
        );
    }

    #[test]
    fn unmatched_domain_is_everything_else() {
        assert_eq!(classify_domain("example.com", None), ProviderTag::EverythingElse);
    }
}
