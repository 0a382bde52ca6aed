//! Wire-level SMTP command/response types, grounded on
//! `rfc5321::parser::Command` and `rfc5321::client_types::Response`.
//!
//! Unlike the teacher, this crate only ever needs to *emit* commands,
//! never parse arbitrary ones off the wire (this workspace is always
//! the client, never the server), so the teacher's `pest`-based grammar
//! in `parser.rs` is not carried over: `Command::encode` is a plain
//! hand-rolled formatter instead.

use crate::timeouts::SmtpClientTimeouts;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ehlo(String),
    Helo(String),
    MailFrom { address: String },
    RcptTo { address: String },
    Data,
    DataDot,
    Rset,
    Quit,
    Noop,
    StartTls,
    Vrfy(String),
}

impl Command {
    pub fn encode(&self) -> String {
        match self {
            Self::Ehlo(domain) => format!("EHLO {domain}\r\n"),
            Self::Helo(domain) => format!("HELO {domain}\r\n"),
            Self::MailFrom { address } => format!("MAIL FROM:<{address}>\r\n"),
            Self::RcptTo { address } => format!("RCPT TO:<{address}>\r\n"),
            Self::Data => "DATA\r\n".to_string(),
            Self::DataDot => ".\r\n".to_string(),
            Self::Rset => "RSET\r\n".to_string(),
            Self::Quit => "QUIT\r\n".to_string(),
            Self::Noop => "NOOP\r\n".to_string(),
            Self::StartTls => "STARTTLS\r\n".to_string(),
            Self::Vrfy(target) => format!("VRFY {target}\r\n"),
        }
    }

    pub fn client_timeout(&self, timeouts: &SmtpClientTimeouts) -> Duration {
        match self {
            Self::Ehlo(_) | Self::Helo(_) => timeouts.ehlo_timeout,
            Self::MailFrom { .. } => timeouts.mail_from_timeout,
            Self::RcptTo { .. } => timeouts.rcpt_to_timeout,
            Self::Data => timeouts.data_timeout,
            Self::DataDot => timeouts.data_dot_timeout,
            Self::Rset => timeouts.rset_timeout,
            Self::Quit | Self::Noop => timeouts.idle_timeout,
            Self::StartTls => timeouts.starttls_timeout,
            Self::Vrfy(_) => timeouts.rcpt_to_timeout,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct EnhancedStatusCode {
    pub class: u8,
    pub subject: u16,
    pub detail: u16,
}

impl EnhancedStatusCode {
    /// Parses a leading `D.D.D ` enhanced status code (RFC 2034) off the
    /// front of a response line's content, if present.
    fn parse_and_strip(content: &str) -> (Option<Self>, &str) {
        let mut parts = content.splitn(2, ' ');
        let candidate = match parts.next() {
            Some(c) => c,
            None => return (None, content),
        };
        let rest = parts.next().unwrap_or("");

        let mut fields = candidate.split('.');
        let (Some(class), Some(subject), Some(detail), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return (None, content);
        };
        match (class.parse(), subject.parse(), detail.parse()) {
            (Ok(class), Ok(subject), Ok(detail)) => {
                (Some(Self { class, subject, detail }), rest)
            }
            _ => (None, content),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Response {
    pub code: u16,
    pub enhanced_code: Option<EnhancedStatusCode>,
    pub content: String,
    pub command: Option<String>,
}

impl Response {
    pub fn to_single_line(&self) -> String {
        let mut line = format!("{} ", self.code);
        if let Some(enh) = &self.enhanced_code {
            line.push_str(&format!("{}.{}.{} ", enh.class, enh.subject, enh.detail));
        }
        line.push_str(&self.content.replace('\n', " "));
        line
    }

    pub fn is_transient(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent(&self) -> bool {
        (500..600).contains(&self.code)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ResponseLine<'a> {
    pub code: u16,
    pub is_final: bool,
    pub content: &'a str,
}

#[derive(Debug, thiserror::Error, Clone)]
#[error("Malformed Response: {0}")]
pub struct MalformedResponse(pub String);

pub fn parse_response_line(line: &str) -> Result<ResponseLine<'_>, MalformedResponse> {
    if line.len() < 4 {
        return Err(MalformedResponse(line.to_string()));
    }
    match line.as_bytes()[3] {
        b' ' | b'-' => match line[0..3].parse::<u16>() {
            Ok(code) => Ok(ResponseLine {
                code,
                is_final: line.as_bytes()[3] == b' ',
                content: &line[4..],
            }),
            Err(_) => Err(MalformedResponse(line.to_string())),
        },
        _ => Err(MalformedResponse(line.to_string())),
    }
}

/// Accumulates a (possibly multi-line) SMTP response, stripping a
/// leading enhanced status code from the first line per RFC 2034.
pub struct ResponseBuilder {
    code: u16,
    enhanced_code: Option<EnhancedStatusCode>,
    lines: Vec<String>,
}

impl ResponseBuilder {
    pub fn new(first: &ResponseLine<'_>) -> Self {
        let (enhanced_code, content) = EnhancedStatusCode::parse_and_strip(first.content);
        Self {
            code: first.code,
            enhanced_code,
            lines: vec![content.to_string()],
        }
    }

    pub fn add_line(&mut self, line: &ResponseLine<'_>) -> Result<(), String> {
        if line.code != self.code {
            return Err(format!("{}{}{}", line.code, if line.is_final { ' ' } else { '-' }, line.content));
        }
        let (_, content) = EnhancedStatusCode::parse_and_strip(line.content);
        self.lines.push(content.to_string());
        Ok(())
    }

    pub fn build(self, command: Option<String>) -> Response {
        Response {
            code: self.code,
            enhanced_code: self.enhanced_code,
            content: self.lines.join("\n"),
            command,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn response_line_parsing() {
        assert_eq!(
            parse_response_line("220 woot").unwrap(),
            ResponseLine { code: 220, is_final: true, content: "woot" }
        );
        assert_eq!(
            parse_response_line("220-woot").unwrap(),
            ResponseLine { code: 220, is_final: false, content: "woot" }
        );
        assert!(parse_response_line("220_woot").is_err());
        assert!(parse_response_line("not really").is_err());
    }

    fn parse_multi_line(lines: &[&str]) -> Result<Response, String> {
        let mut parsed = parse_response_line(lines[0]).map_err(|e| e.0)?;
        let mut b = ResponseBuilder::new(&parsed);
        for line in &lines[1..] {
            parsed = parse_response_line(line).map_err(|e| e.0)?;
            b.add_line(&parsed)?;
        }
        assert!(parsed.is_final);
        Ok(b.build(None))
    }

    #[test]
    fn multi_line_response() {
        assert_eq!(
            parse_multi_line(&["220-woot", "220-more", "220 done"]).unwrap(),
            Response {
                code: 220,
                enhanced_code: None,
                content: "woot\nmore\ndone".to_string(),
                command: None,
            }
        );

        let err = parse_multi_line(&["220-woot", "221-more", "220 done"]).unwrap_err();
        assert_eq!(err, "221-more");
    }

    #[test]
    fn enhanced_status_code_is_stripped() {
        let parsed = parse_multi_line(&["250 2.1.5 ok"]).unwrap();
        assert_eq!(parsed.content, "ok");
        assert_eq!(
            parsed.enhanced_code,
            Some(EnhancedStatusCode { class: 2, subject: 1, detail: 5 })
        );
    }
}
