//! Provider probes (C7): non-SMTP verification routes that implement
//! the same outcome contract as the dialog engine. The Yahoo signup-form
//! probe is grounded on `mta-sts::Getter`'s `reqwest`-based HTTP fetch
//! (no-redirect client, explicit timeout), reshaped into a two-step
//! fetch-token/post-candidate flow instead of a single GET.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SIGNUP_URL: &str = "https://login.yahoo.com/account/create";
const VALIDATE_URL: &str = "https://login.yahoo.com/account/module/create?validateField=yid";

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub is_valid: bool,
    pub is_deliverable: bool,
    pub error: Option<String>,
}

impl ProbeOutcome {
    fn exists() -> Self {
        Self { is_valid: true, is_deliverable: true, error: None }
    }

    fn does_not_exist() -> Self {
        Self { is_valid: true, is_deliverable: false, error: None }
    }

    fn inconclusive(error: impl Into<String>) -> Self {
        Self { is_valid: true, is_deliverable: false, error: Some(error.into()) }
    }
}

/// Abstracts the two HTTP calls the Yahoo probe makes, so tests can
/// supply canned responses without touching the network. Mirrors
/// `mta_sts::policy::Get`'s seam between the network call and the
/// interpretation logic above it.
#[async_trait]
pub trait YahooTransport: Send + Sync {
    async fn fetch_signup_page(&self) -> anyhow::Result<(String, String)>;
    async fn post_candidate(&self, acrumb: &str, cookie: &str, candidate: &str) -> anyhow::Result<(u16, String)>;
}

pub struct ReqwestYahooTransport {
    client: reqwest::Client,
}

impl ReqwestYahooTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl YahooTransport for ReqwestYahooTransport {
    async fn fetch_signup_page(&self) -> anyhow::Result<(String, String)> {
        let response = self.client.get(SIGNUP_URL).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP {}: {}", response.status().as_u16(), response.status());
        }
        let cookie = response
            .headers()
            .get(reqwest::header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;
        let acrumb = extract_acrumb(&body).ok_or_else(|| anyhow::anyhow!("acrumb token not found on signup page"))?;
        Ok((acrumb, cookie))
    }

    async fn post_candidate(&self, acrumb: &str, cookie: &str, candidate: &str) -> anyhow::Result<(u16, String)> {
        let response = self
            .client
            .post(VALIDATE_URL)
            .header(reqwest::header::COOKIE, cookie)
            .form(&[("acrumb", acrumb), ("yid", candidate)])
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }
}

fn extract_acrumb(body: &str) -> Option<String> {
    let marker = "\"acrumb\":\"";
    let start = body.find(marker)? + marker.len();
    let end = body[start..].find('"')? + start;
    Some(body[start..end].to_string())
}

#[derive(Debug, Deserialize)]
struct ValidationResponse {
    #[serde(default)]
    errors: Vec<ValidationError>,
}

#[derive(Debug, Deserialize)]
struct ValidationError {
    name: String,
}

const EXISTS_ERROR_NAMES: &[&str] =
    &["IDENTIFIER_NOT_AVAILABLE", "IDENTIFIER_ALREADY_EXISTS", "IDENTIFIER_EXISTS"];

const YAHOO_DOMAINS: &[&str] = &["yahoo.com", "ymail.com", "rocketmail.com"];

fn is_yahoo_domain(domain: &str) -> bool {
    YAHOO_DOMAINS.iter().any(|d| domain == *d || domain.ends_with(&format!(".{d}")))
}

/// Runs the Yahoo signup-form probe for `local_part@domain`. Rejects
/// non-Yahoo domains outright; the caller is expected to have already
/// gated this probe behind `useYahooApi` and a Yahoo `ProviderTag`.
pub async fn probe_yahoo(
    transport: &dyn YahooTransport,
    local_part: &str,
    domain: &str,
) -> ProbeOutcome {
    if !is_yahoo_domain(domain) {
        return ProbeOutcome::inconclusive("Not a Yahoo domain");
    }

    let (acrumb, cookie) = match transport.fetch_signup_page().await {
        Ok(pair) => pair,
        Err(err) => return ProbeOutcome::inconclusive(err.to_string()),
    };

    let (status, body) = match transport.post_candidate(&acrumb, &cookie, local_part).await {
        Ok(pair) => pair,
        Err(err) => return ProbeOutcome::inconclusive(err.to_string()),
    };

    if !(200..300).contains(&status) {
        return ProbeOutcome::inconclusive(format!("HTTP {status}: {body}"));
    }

    let parsed: ValidationResponse = match serde_json::from_str(&body) {
        Ok(parsed) => parsed,
        Err(_) => return ProbeOutcome::does_not_exist(),
    };

    match parsed.errors.first() {
        None => ProbeOutcome::does_not_exist(),
        Some(err) if EXISTS_ERROR_NAMES.contains(&err.name.as_str()) => ProbeOutcome::exists(),
        Some(err) => ProbeOutcome::inconclusive(err.name.clone()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    struct FakeTransport {
        signup: anyhow::Result<(String, String)>,
        validate: Mutex<Option<anyhow::Result<(u16, String)>>>,
    }

    impl FakeTransport {
        fn ok(validate_body: &str) -> Self {
            Self {
                signup: Ok(("crumb123".to_string(), "B=cookie".to_string())),
                validate: Mutex::new(Some(Ok((200, validate_body.to_string())))),
            }
        }
    }

    #[async_trait]
    impl YahooTransport for FakeTransport {
        async fn fetch_signup_page(&self) -> anyhow::Result<(String, String)> {
            match &self.signup {
                Ok(pair) => Ok(pair.clone()),
                Err(_) => anyhow::bail!("signup fetch failed"),
            }
        }

        async fn post_candidate(&self, _: &str, _: &str, _: &str) -> anyhow::Result<(u16, String)> {
            self.validate.lock().unwrap().take().unwrap()
        }
    }

    #[test]
    fn extracts_acrumb_from_html() {
        let html = r#"<script>var YUI={"acrumb":"abc123xyz","other":1}</script>"#;
        assert_eq!(extract_acrumb(html), Some("abc123xyz".to_string()));
    }

    #[test]
    fn rejects_non_yahoo_domain() {
        assert!(!is_yahoo_domain("gmail.com"));
        assert!(is_yahoo_domain("yahoo.com"));
        assert!(is_yahoo_domain("mail.yahoo.com"));
    }

    #[tokio::test]
    async fn guards_non_yahoo_domain() {
        let transport = FakeTransport::ok(r#"{"errors":[]}"#);
        let outcome = probe_yahoo(&transport, "someone", "gmail.com").await;
        assert_eq!(outcome.error.as_deref(), Some("Not a Yahoo domain"));
        assert!(!outcome.is_deliverable);
    }

    #[tokio::test]
    async fn identifier_exists_error_means_deliverable() {
        let transport = FakeTransport::ok(r#"{"errors":[{"name":"IDENTIFIER_NOT_AVAILABLE"}]}"#);
        let outcome = probe_yahoo(&transport, "existing", "yahoo.com").await;
        assert_eq!(outcome, ProbeOutcome::exists());
    }

    #[tokio::test]
    async fn empty_errors_means_not_deliverable() {
        let transport = FakeTransport::ok(r#"{"errors":[]}"#);
        let outcome = probe_yahoo(&transport, "freshhandle", "yahoo.com").await;
        assert_eq!(outcome, ProbeOutcome::does_not_exist());
    }

    #[tokio::test]
    async fn unknown_error_name_is_inconclusive() {
        let transport = FakeTransport::ok(r#"{"errors":[{"name":"RATE_LIMITED"}]}"#);
        let outcome = probe_yahoo(&transport, "someone", "yahoo.com").await;
        assert!(!outcome.is_deliverable);
        assert_eq!(outcome.error.as_deref(), Some("RATE_LIMITED"));
    }

    #[tokio::test]
    async fn malformed_json_is_not_deliverable() {
        let transport = FakeTransport::ok("not json");
        let outcome = probe_yahoo(&transport, "someone", "yahoo.com").await;
        assert_eq!(outcome, ProbeOutcome::does_not_exist());
    }
}
