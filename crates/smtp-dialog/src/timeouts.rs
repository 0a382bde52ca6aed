use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-command timeouts for a single SMTP dialog, grounded on
/// `rfc5321::client_types::SmtpClientTimeouts`.
#[derive(Serialize, Deserialize, Copy, Clone, Debug)]
pub struct SmtpClientTimeouts {
    #[serde(default = "SmtpClientTimeouts::default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,
    #[serde(default = "SmtpClientTimeouts::default_ehlo_timeout", with = "duration_serde")]
    pub ehlo_timeout: Duration,
    #[serde(default = "SmtpClientTimeouts::default_mail_from_timeout", with = "duration_serde")]
    pub mail_from_timeout: Duration,
    #[serde(default = "SmtpClientTimeouts::default_rcpt_to_timeout", with = "duration_serde")]
    pub rcpt_to_timeout: Duration,
    #[serde(default = "SmtpClientTimeouts::default_data_timeout", with = "duration_serde")]
    pub data_timeout: Duration,
    #[serde(default = "SmtpClientTimeouts::default_data_dot_timeout", with = "duration_serde")]
    pub data_dot_timeout: Duration,
    #[serde(default = "SmtpClientTimeouts::default_rset_timeout", with = "duration_serde")]
    pub rset_timeout: Duration,
    #[serde(default = "SmtpClientTimeouts::default_idle_timeout", with = "duration_serde")]
    pub idle_timeout: Duration,
    #[serde(default = "SmtpClientTimeouts::default_starttls_timeout", with = "duration_serde")]
    pub starttls_timeout: Duration,
}

impl Default for SmtpClientTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout: Self::default_connect_timeout(),
            ehlo_timeout: Self::default_ehlo_timeout(),
            mail_from_timeout: Self::default_mail_from_timeout(),
            rcpt_to_timeout: Self::default_rcpt_to_timeout(),
            data_timeout: Self::default_data_timeout(),
            data_dot_timeout: Self::default_data_dot_timeout(),
            rset_timeout: Self::default_rset_timeout(),
            idle_timeout: Self::default_idle_timeout(),
            starttls_timeout: Self::default_starttls_timeout(),
        }
    }
}

impl SmtpClientTimeouts {
    fn default_connect_timeout() -> Duration {
        Duration::from_secs(30)
    }
    fn default_ehlo_timeout() -> Duration {
        Duration::from_secs(30)
    }
    fn default_mail_from_timeout() -> Duration {
        Duration::from_secs(30)
    }
    fn default_rcpt_to_timeout() -> Duration {
        Duration::from_secs(30)
    }
    fn default_data_timeout() -> Duration {
        Duration::from_secs(30)
    }
    fn default_data_dot_timeout() -> Duration {
        Duration::from_secs(30)
    }
    fn default_rset_timeout() -> Duration {
        Duration::from_secs(5)
    }
    fn default_idle_timeout() -> Duration {
        Duration::from_secs(5)
    }
    fn default_starttls_timeout() -> Duration {
        Duration::from_secs(10)
    }

    /// Tight timeouts suitable for a single reachability probe, where
    /// waiting out a slow or unresponsive host across many retries would
    /// blow the overall `verifyOne` budget.
    pub fn short_timeouts() -> Self {
        let short = Duration::from_secs(10);
        Self {
            connect_timeout: short,
            ehlo_timeout: short,
            mail_from_timeout: short,
            rcpt_to_timeout: short,
            data_timeout: short,
            data_dot_timeout: short,
            rset_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(5),
            starttls_timeout: short,
        }
    }

    pub fn total_dialog_duration(&self) -> Duration {
        self.connect_timeout
            + self.ehlo_timeout
            + self.starttls_timeout
            + self.mail_from_timeout
            + self.rcpt_to_timeout
            + self.idle_timeout
    }
}
