//! The SMTP dialog engine itself, grounded on `rfc5321::client::SmtpClient`.
//!
//! Simplifications relative to the teacher: no RFC 2920 pipelining (a
//! reachability probe inspects each response before deciding the next
//! command, so there is nothing to gain by pipelining), no AUTH, no
//! message body transfer — this client only ever issues EHLO/STARTTLS/
//! MAIL FROM/RCPT TO/RSET/QUIT, which is as far as a verification dialog
//! goes.

use crate::proto::{parse_response_line, Command, Response, ResponseBuilder};
use crate::timeouts::SmtpClientTimeouts;
use crate::traits::{AsyncReadAndWrite, BoxedAsyncReadAndWrite};
use smtp_tls::TlsOptions;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::timeout;
use tokio_rustls::rustls::pki_types::ServerName;

const MAX_LINE_LEN: usize = 4096;

#[derive(Debug, Error, Clone)]
pub enum ClientError {
    #[error("response is not UTF-8")]
    Utf8,
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("response line is too long")]
    ResponseTooLong,
    #[error("not connected")]
    NotConnected,
    #[error("command rejected: {0:?}")]
    Rejected(Response),
    #[error("{0} is not a valid DNS name for STARTTLS")]
    InvalidDnsName(String),
    #[error("server does not advertise STARTTLS support")]
    StartTlsUnsupported,
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),
    #[error("timed out waiting {duration:?} for a response to {command:?}")]
    TimeOutResponse {
        command: Option<Command>,
        duration: Duration,
    },
    #[error("timed out writing {command:?}")]
    TimeOutRequest { command: Command },
    #[error("error {error} reading response to {command:?}")]
    ReadError {
        command: Option<Command>,
        error: String,
    },
    #[error("error {error} writing {command:?}")]
    WriteError { command: Command, error: String },
    #[error("connection closed by peer")]
    ConnectionClosed,
}

impl ClientError {
    /// Mirrors `rfc5321::ClientError::was_due_to_message`: distinguishes
    /// a transport-level failure (worth retrying on a fresh connection,
    /// possibly against a different MX host) from a dialog outcome that
    /// is intrinsic to this mailbox/domain and would recur on retry.
    pub fn was_due_to_message(&self) -> bool {
        matches!(self, Self::Rejected(response) if !response.is_transient())
    }
}

impl From<std::string::FromUtf8Error> for ClientError {
    fn from(_: std::string::FromUtf8Error) -> Self {
        ClientError::Utf8
    }
}

/// An ESMTP capability advertised in a multiline EHLO response, e.g.
/// `STARTTLS` or `SIZE 35882577`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EsmtpCapability {
    pub name: String,
    pub param: Option<String>,
}

#[derive(Debug)]
pub struct SmtpClient {
    socket: Option<BoxedAsyncReadAndWrite>,
    hostname: String,
    capabilities: HashSet<EsmtpCapability>,
    read_buffer: Vec<u8>,
    timeouts: SmtpClientTimeouts,
}

fn extract_hostname(hostname: &str) -> &str {
    let fields: Vec<&str> = hostname.rsplitn(2, ':').collect();
    let hostname = if fields.len() == 2 { fields[1] } else { hostname };
    let hostname = if hostname.starts_with('[') && hostname.ends_with(']') {
        &hostname[1..hostname.len() - 1]
    } else {
        hostname
    };
    hostname.strip_suffix('.').unwrap_or(hostname)
}

impl SmtpClient {
    pub async fn connect<A: ToSocketAddrs + ToString + Clone>(
        addr: A,
        timeouts: SmtpClientTimeouts,
    ) -> Result<Self, std::io::Error> {
        let stream = timeout(timeouts.connect_timeout, TcpStream::connect(addr.clone()))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;
        Ok(Self::with_stream(stream, addr.to_string(), timeouts))
    }

    pub fn with_stream<S: AsyncReadAndWrite + 'static, H: AsRef<str>>(
        stream: S,
        peer_hostname: H,
        timeouts: SmtpClientTimeouts,
    ) -> Self {
        Self {
            socket: Some(Box::new(stream)),
            hostname: extract_hostname(peer_hostname.as_ref()).to_string(),
            capabilities: HashSet::new(),
            read_buffer: Vec::with_capacity(1024),
            timeouts,
        }
    }

    /// Wraps an already-connected `stream` in TLS before any SMTP traffic
    /// is exchanged (RFC 8314 implicit TLS, used on port 465), as opposed
    /// to [`Self::starttls`] which upgrades mid-dialog.
    pub async fn connect_implicit_tls<H: AsRef<str>>(
        stream: TcpStream,
        peer_hostname: H,
        domain: &str,
        tls_options: &TlsOptions,
        timeouts: SmtpClientTimeouts,
    ) -> Result<Self, ClientError> {
        let connector = tls_options
            .build_connector()
            .map_err(|e| ClientError::TlsHandshake(e.to_string()))?;
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|_| ClientError::InvalidDnsName(domain.to_string()))?;

        let tls_stream = timeout(timeouts.connect_timeout, connector.connect(server_name, stream))
            .await
            .map_err(|_| ClientError::TlsHandshake("handshake timed out".to_string()))?
            .map_err(|e| ClientError::TlsHandshake(e.to_string()))?;

        Ok(Self {
            socket: Some(Box::new(tls_stream)),
            hostname: extract_hostname(peer_hostname.as_ref()).to_string(),
            capabilities: HashSet::new(),
            read_buffer: Vec::with_capacity(1024),
            timeouts,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }

    async fn read_line(&mut self, timeout_duration: Duration, cmd: Option<&Command>) -> Result<String, ClientError> {
        loop {
            let mut iter = self.read_buffer.iter().enumerate();
            while let Some((i, &b)) = iter.next() {
                if b != b'\r' {
                    continue;
                }
                if let Some((_, b'\n')) = iter.next() {
                    if i > MAX_LINE_LEN {
                        self.read_buffer.drain(0..i + 2);
                        return Err(ClientError::ResponseTooLong);
                    }
                    let line = String::from_utf8(self.read_buffer[0..i].to_vec())?;
                    self.read_buffer.drain(0..i + 2);
                    return Ok(line);
                }
            }
            if self.read_buffer.len() > MAX_LINE_LEN {
                self.socket.take();
                return Err(ClientError::ResponseTooLong);
            }

            let mut data = [0u8; MAX_LINE_LEN];
            let size = match self.socket.as_mut() {
                Some(s) => match timeout(timeout_duration, s.read(&mut data)).await {
                    Ok(Ok(size)) => size,
                    Ok(Err(err)) => {
                        self.socket.take();
                        return Err(ClientError::ReadError {
                            command: cmd.cloned(),
                            error: err.to_string(),
                        });
                    }
                    Err(_) => {
                        self.socket.take();
                        return Err(ClientError::TimeOutResponse {
                            command: cmd.cloned(),
                            duration: timeout_duration,
                        });
                    }
                },
                None => return Err(ClientError::NotConnected),
            };
            if size == 0 {
                self.socket.take();
                return Err(ClientError::ConnectionClosed);
            }
            self.read_buffer.extend_from_slice(&data[0..size]);
        }
    }

    pub async fn read_response(
        &mut self,
        command: Option<&Command>,
        timeout_duration: Duration,
    ) -> Result<Response, ClientError> {
        let mut line = self.read_line(timeout_duration, command).await?;
        tracing::trace!("recv<-{}: {line}", self.hostname);
        let mut parsed = parse_response_line(&line).map_err(|e| ClientError::MalformedResponse(e.0))?;
        let mut builder = ResponseBuilder::new(&parsed);

        let subsequent_timeout = Duration::from_secs(60).min(timeout_duration);
        while !parsed.is_final {
            line = self.read_line(subsequent_timeout, command).await?;
            parsed = parse_response_line(&line).map_err(|e| ClientError::MalformedResponse(e.0))?;
            builder.add_line(&parsed).map_err(ClientError::MalformedResponse)?;
        }

        let response = builder.build(command.map(|c| c.encode()));
        tracing::trace!("{}: {response:?}", self.hostname);
        Ok(response)
    }

    async fn write_command(&mut self, command: &Command) -> Result<(), ClientError> {
        let line = command.encode();
        tracing::trace!("send->{}: {}", self.hostname, line.escape_debug());
        let timeout_duration = command.client_timeout(&self.timeouts);
        let socket = self.socket.as_mut().ok_or(ClientError::NotConnected)?;
        match timeout(timeout_duration, socket.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.socket.take();
                return Err(ClientError::WriteError {
                    command: command.clone(),
                    error: err.to_string(),
                });
            }
            Err(_) => {
                self.socket.take();
                return Err(ClientError::TimeOutRequest { command: command.clone() });
            }
        }
        Ok(())
    }

    pub async fn send_command(&mut self, command: &Command) -> Result<Response, ClientError> {
        self.write_command(command).await?;
        self.read_response(Some(command), command.client_timeout(&self.timeouts)).await
    }

    /// Issues EHLO and records the advertised capability set, replacing
    /// whatever was recorded before (used both for the initial EHLO and
    /// the mandatory re-EHLO after STARTTLS).
    pub async fn ehlo(&mut self, domain: &str) -> Result<Response, ClientError> {
        let response = self.send_command(&Command::Ehlo(domain.to_string())).await?;
        if response.is_permanent() {
            return Err(ClientError::Rejected(response));
        }
        self.capabilities.clear();
        for line in response.content.lines().skip(1) {
            let mut parts = line.splitn(2, ' ');
            let name = parts.next().unwrap_or("").to_ascii_uppercase();
            if name.is_empty() {
                continue;
            }
            self.capabilities.insert(EsmtpCapability {
                name,
                param: parts.next().map(|s| s.to_string()),
            });
        }
        Ok(response)
    }

    /// Upgrades the connection to TLS via STARTTLS (RFC 3207), then
    /// always re-issues EHLO and discards the pre-TLS capability set
    /// (RFC 3207 §4.2): a man in the middle could have injected
    /// capability lines into the plaintext EHLO that no longer apply
    /// once the channel is authenticated.
    pub async fn starttls(
        &mut self,
        domain: &str,
        tls_options: &TlsOptions,
    ) -> Result<(), ClientError> {
        if !self.has_capability("STARTTLS") {
            return Err(ClientError::StartTlsUnsupported);
        }

        let response = self.send_command(&Command::StartTls).await?;
        if response.code != 220 {
            return Err(ClientError::Rejected(response));
        }

        let connector = tls_options
            .build_connector()
            .map_err(|e| ClientError::TlsHandshake(e.to_string()))?;
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|_| ClientError::InvalidDnsName(domain.to_string()))?;

        let socket = self.socket.take().ok_or(ClientError::NotConnected)?;
        let tls_stream = timeout(self.timeouts.starttls_timeout, connector.connect(server_name, socket))
            .await
            .map_err(|_| ClientError::TimeOutRequest { command: Command::StartTls })?
            .map_err(|e| ClientError::TlsHandshake(e.to_string()))?;

        self.socket = Some(Box::new(tls_stream));
        self.read_buffer.clear();
        self.ehlo(domain).await?;
        Ok(())
    }

    pub async fn mail_from(&mut self, address: &str) -> Result<Response, ClientError> {
        let response = self
            .send_command(&Command::MailFrom { address: address.to_string() })
            .await?;
        if response.code != 250 {
            return Err(ClientError::Rejected(response));
        }
        Ok(response)
    }

    /// Issues RCPT TO and returns its response verbatim, even when
    /// rejected: unlike most other steps, the caller needs to inspect
    /// the rejection response itself (it is the verification signal),
    /// not just learn that something went wrong.
    pub async fn rcpt_to(&mut self, address: &str) -> Result<Response, ClientError> {
        self.send_command(&Command::RcptTo { address: address.to_string() }).await
    }

    pub async fn vrfy(&mut self, target: &str) -> Result<Response, ClientError> {
        self.send_command(&Command::Vrfy(target.to_string())).await
    }

    pub async fn rset(&mut self) -> Result<Response, ClientError> {
        self.send_command(&Command::Rset).await
    }

    pub async fn quit(&mut self) {
        if self.socket.is_some() {
            let _ = self.send_command(&Command::Quit).await;
            self.socket.take();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_extract_hostname() {
        assert_eq!(extract_hostname("mail.example.com"), "mail.example.com");
        assert_eq!(extract_hostname("mail.example.com:25"), "mail.example.com");
        assert_eq!(extract_hostname("mail.example.com."), "mail.example.com");
        assert_eq!(extract_hostname("[10.0.0.1]:25"), "10.0.0.1");
    }
}
