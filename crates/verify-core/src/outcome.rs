//! Data types shared between the dialog engine (C5) and the
//! orchestrator (C8): the step sequence, connection parameters, and the
//! dialog's final outcome. Grounded on the shapes named in spec.md §3.

use reply_classify::ErrorKind;
use serde::{Deserialize, Serialize};
use smtp_tls::{MinTlsVersion, TlsOptions as TlsConnectorOptions};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum SmtpStep {
    Greeting,
    Ehlo,
    StartTls,
    MailFrom,
    RcptTo,
    Vrfy,
    Quit,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Sequence {
    pub steps: Vec<SmtpStep>,
    pub from: Option<String>,
    pub vrfy_target: Option<String>,
}

impl Default for Sequence {
    fn default() -> Self {
        Self {
            steps: vec![SmtpStep::Greeting, SmtpStep::Ehlo, SmtpStep::MailFrom, SmtpStep::RcptTo],
            from: None,
            vrfy_target: None,
        }
    }
}

impl Sequence {
    pub fn envelope_from(&self) -> &str {
        self.from.as_deref().unwrap_or("")
    }
}

/// Either `disabled`, or a concrete policy for a TLS upgrade attempt.
#[derive(Debug, Clone, Copy)]
pub enum TlsPolicy {
    Disabled,
    Enabled { reject_unauthorized: bool, min_version: MinTlsVersion },
}

impl Default for TlsPolicy {
    fn default() -> Self {
        // Matches spec.md §4.5's stated default: verification dialogs
        // talk to arbitrary third-party MX hosts, many of which present
        // certificates that would fail strict validation; rejecting the
        // dialog over that would make the probe useless.
        TlsPolicy::Enabled {
            reject_unauthorized: false,
            min_version: MinTlsVersion::Tls12,
        }
    }
}

impl TlsPolicy {
    pub fn to_connector_options(self) -> Option<TlsConnectorOptions> {
        match self {
            TlsPolicy::Disabled => None,
            TlsPolicy::Enabled { reject_unauthorized, min_version } => {
                Some(TlsConnectorOptions { reject_unauthorized, min_version })
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectionParams {
    pub port: u16,
    pub use_implicit_tls: bool,
    pub tls_policy: TlsPolicy,
}

impl ConnectionParams {
    /// Derives connection parameters for `port` per spec.md §4.5: 465
    /// is implicit TLS, 25/587 attempt STARTTLS opportunistically, any
    /// other port is plaintext-only.
    pub fn for_port(port: u16, tls_policy: TlsPolicy) -> Self {
        match port {
            465 => Self { port, use_implicit_tls: true, tls_policy },
            25 | 587 => Self { port, use_implicit_tls: false, tls_policy },
            _ => Self { port, use_implicit_tls: false, tls_policy: TlsPolicy::Disabled },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum Tri {
    Yes,
    No,
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DialogOutcome {
    pub connected: bool,
    pub tls_applied: bool,
    pub final_code: Option<u16>,
    pub deliverable: Tri,
    pub classification: ErrorKind,
    pub raw_transcript: Vec<String>,
}

impl DialogOutcome {
    pub fn connection_error() -> Self {
        Self {
            connected: false,
            tls_applied: false,
            final_code: None,
            deliverable: Tri::Unknown,
            classification: ErrorKind::ConnectionError,
            raw_transcript: Vec::new(),
        }
    }

    pub fn timeout() -> Self {
        Self {
            connected: false,
            tls_applied: false,
            final_code: None,
            deliverable: Tri::Unknown,
            classification: ErrorKind::Timeout,
            raw_transcript: Vec::new(),
        }
    }
}
