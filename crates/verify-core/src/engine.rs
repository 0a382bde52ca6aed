//! The SMTP dialog engine (C5): drives a configured [`Sequence`] of
//! steps against a chosen MX host, deriving connection parameters per
//! port and retrying transient failures with backoff. Grounded on
//! `rfc5321::client::SmtpClient`'s connect/EHLO/STARTTLS/MAIL FROM/RCPT
//! TO flow, reshaped around the step-sequence/jump model spec.md §4.5
//! describes rather than the teacher's fixed `send_mail` pipeline.

use crate::outcome::{ConnectionParams, DialogOutcome, Sequence, SmtpStep, Tri};
use regex::Regex;
use reply_classify::ErrorKind;
use smtp_dialog::{ClientError, Response, SmtpClient, SmtpClientTimeouts};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout as tokio_timeout;

static POLICY_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)spam|policy|rbl|blocked").unwrap());

#[derive(Debug, Clone)]
pub struct DialogOptions {
    pub hostname: String,
    pub use_vrfy: bool,
    pub per_step_timeout: Duration,
    pub max_retries: u8,
}

impl Default for DialogOptions {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            use_vrfy: true,
            per_step_timeout: Duration::from_secs(3),
            max_retries: 1,
        }
    }
}

/// Runs the configured sequence against `mx_host`, trying `ports` in
/// order. A definitive verdict (anything but `Timeout`/`ConnectionError`)
/// short-circuits the port loop. Returns the preferred port alongside
/// the outcome so C9 can memoize it.
pub async fn run(
    mx_host: &str,
    target_address: &str,
    ports: &[u16],
    sequence: &Sequence,
    options: &DialogOptions,
) -> (DialogOutcome, Option<u16>) {
    if ports.is_empty() {
        return (DialogOutcome::connection_error(), None);
    }

    for &port in ports {
        let params = ConnectionParams::for_port(port, Default::default());
        for attempt in 1..=options.max_retries.max(1) {
            let outcome = run_one_attempt(mx_host, port, target_address, sequence, &params, options).await;
            let retryable = matches!(outcome.classification, ErrorKind::Timeout | ErrorKind::ConnectionError)
                && !outcome.connected;
            if !retryable {
                return (outcome, Some(port));
            }
            if attempt < options.max_retries.max(1) {
                let backoff_ms = (1000u64 * 2u64.pow((attempt - 1) as u32)).min(5000);
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            } else if ports.last() == Some(&port) {
                return (outcome, None);
            }
        }
    }

    (DialogOutcome::connection_error(), None)
}

async fn run_one_attempt(
    mx_host: &str,
    port: u16,
    target_address: &str,
    sequence: &Sequence,
    params: &ConnectionParams,
    options: &DialogOptions,
) -> DialogOutcome {
    let mut transcript = Vec::new();
    let timeouts = SmtpClientTimeouts {
        connect_timeout: options.per_step_timeout,
        ehlo_timeout: options.per_step_timeout,
        mail_from_timeout: options.per_step_timeout,
        rcpt_to_timeout: options.per_step_timeout,
        starttls_timeout: options.per_step_timeout,
        ..SmtpClientTimeouts::default()
    };

    let connect_result = tokio_timeout(
        options.per_step_timeout,
        TcpStream::connect((mx_host, port)),
    )
    .await;

    let stream = match connect_result {
        Ok(Ok(stream)) => stream,
        Ok(Err(_)) => return DialogOutcome::connection_error(),
        Err(_) => return DialogOutcome::timeout(),
    };
    let _ = stream.set_nodelay(true);

    let mut tls_applied = false;
    let peer_hostname = format!("{mx_host}:{port}");
    let mut client = if params.use_implicit_tls {
        match params.tls_policy.to_connector_options() {
            Some(tls_options) => {
                match SmtpClient::connect_implicit_tls(stream, &peer_hostname, mx_host, &tls_options, timeouts).await {
                    Ok(client) => {
                        tls_applied = true;
                        client
                    }
                    Err(err) => return dialog_error_outcome(err, transcript),
                }
            }
            None => SmtpClient::with_stream(stream, peer_hostname, timeouts),
        }
    } else {
        SmtpClient::with_stream(stream, peer_hostname, timeouts)
    };

    let mut index = 0usize;
    let mut deliverable = Tri::Unknown;
    let mut classification = ErrorKind::Unknown;
    let mut final_code = None;

    while index < sequence.steps.len() {
        let step = sequence.steps[index];
        match step {
            SmtpStep::Greeting => match client.read_response(None, options.per_step_timeout).await {
                Ok(response) => {
                    transcript.push(response.to_single_line());
                    if response.code != 220 {
                        classification = ErrorKind::Unknown;
                        final_code = Some(response.code);
                        break;
                    }
                }
                Err(err) => return dialog_error_outcome(err, transcript),
            },
            SmtpStep::Ehlo => match client.ehlo(&options.hostname).await {
                Ok(response) => {
                    transcript.push(response.to_single_line());
                    let wants_tls = matches!(params.tls_policy, crate::outcome::TlsPolicy::Enabled { .. })
                        && !tls_applied
                        && sequence.steps.contains(&SmtpStep::StartTls);
                    if wants_tls {
                        if let Some(pos) = sequence.steps.iter().position(|s| *s == SmtpStep::StartTls) {
                            index = pos;
                            continue;
                        }
                    }
                }
                Err(err) => return dialog_error_outcome(err, transcript),
            },
            SmtpStep::StartTls => {
                if let Some(tls_options) = params.tls_policy.to_connector_options() {
                    if client.has_capability("STARTTLS") {
                        match client.starttls(mx_host, &tls_options).await {
                            Ok(()) => {
                                tls_applied = true;
                                transcript.push("STARTTLS ok".to_string());
                            }
                            Err(err) => return dialog_error_outcome(err, transcript),
                        }
                    }
                }
            }
            SmtpStep::MailFrom => match client.mail_from(sequence.envelope_from()).await {
                Ok(response) => transcript.push(response.to_single_line()),
                Err(ClientError::Rejected(response)) => {
                    transcript.push(response.to_single_line());
                    final_code = Some(response.code);
                    classification = ErrorKind::Unknown;
                    break;
                }
                Err(err) => return dialog_error_outcome(err, transcript),
            },
            SmtpStep::RcptTo => {
                let response = match client.rcpt_to(target_address).await {
                    Ok(response) => response,
                    Err(ClientError::Rejected(response)) => response,
                    Err(err) => return dialog_error_outcome(err, transcript),
                };
                transcript.push(response.to_single_line());
                final_code = Some(response.code);
                let (d, k, jump_to_vrfy) = classify_rcpt_response(&response);
                deliverable = d;
                classification = k;
                if jump_to_vrfy
                    && options.use_vrfy
                    && client.has_capability("VRFY")
                    && sequence.steps.contains(&SmtpStep::Vrfy)
                {
                    if let Some(pos) = sequence.steps.iter().position(|s| *s == SmtpStep::Vrfy) {
                        index = pos;
                        continue;
                    }
                }
                break;
            }
            SmtpStep::Vrfy => {
                let target = sequence
                    .vrfy_target
                    .clone()
                    .unwrap_or_else(|| target_address.split('@').next().unwrap_or("").to_string());
                match client.vrfy(&target).await {
                    Ok(response) => {
                        transcript.push(response.to_single_line());
                        final_code = Some(response.code);
                        deliverable = if matches!(response.code, 250 | 251 | 252) {
                            Tri::Yes
                        } else {
                            Tri::Unknown
                        };
                        classification = ErrorKind::Unknown;
                    }
                    Err(ClientError::Rejected(response)) => {
                        transcript.push(response.to_single_line());
                        final_code = Some(response.code);
                    }
                    Err(err) => return dialog_error_outcome(err, transcript),
                }
                break;
            }
            SmtpStep::Quit => {}
        }
        index += 1;
    }

    client.quit().await;

    DialogOutcome {
        connected: true,
        tls_applied,
        final_code,
        deliverable,
        classification,
        raw_transcript: transcript,
    }
}

fn dialog_error_outcome(err: ClientError, transcript: Vec<String>) -> DialogOutcome {
    let classification = match &err {
        ClientError::TimeOutResponse { .. } | ClientError::TimeOutRequest { .. } => ErrorKind::Timeout,
        ClientError::Rejected(response) => reply_classify::classify_response(response, None).kind,
        _ => ErrorKind::ConnectionError,
    };
    DialogOutcome {
        connected: !matches!(classification, ErrorKind::ConnectionError),
        tls_applied: false,
        final_code: None,
        deliverable: Tri::Unknown,
        classification,
        raw_transcript: transcript,
    }
}

/// Classifies an RCPT TO response per spec.md §4.5's fixed rule table.
/// Returns `(deliverable, classification, should_try_vrfy)`.
fn classify_rcpt_response(response: &Response) -> (Tri, ErrorKind, bool) {
    match response.code {
        250 | 251 => (Tri::Yes, ErrorKind::Unknown, false),
        550 | 551 | 553 => {
            if POLICY_PATTERN.is_match(&response.content) {
                (Tri::Unknown, ErrorKind::PolicyRejection, false)
            } else {
                (Tri::No, ErrorKind::Invalid, false)
            }
        }
        552 | 452 => (Tri::No, ErrorKind::FullInbox, false),
        code if (400..500).contains(&code) => {
            let classified = reply_classify::classify(&response.content, None, Some(code));
            (Tri::Unknown, classified.kind, false)
        }
        code if (500..600).contains(&code) => (Tri::Unknown, ErrorKind::Unknown, true),
        _ => (Tri::Unknown, ErrorKind::Unknown, false),
    }
}

/// Used by the catch-all probe (spec.md §9): a single RCPT TO against a
/// random local part, to see whether the domain accepts everything.
pub fn random_catch_all_local_part() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}
