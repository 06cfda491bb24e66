//! Minimal SMTP client for an internal, unauthenticated relay.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;
use uuid::Uuid;

use super::transport::{Mail, MailTransport};
use crate::calendar;
use crate::utils::error::{AppError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SmtpTransport {
    host: String,
    port: u16,
    /// Name announced in EHLO.
    hello_name: String,
    /// Upper bound for one complete delivery, connect included.
    timeout: Duration,
}

impl SmtpTransport {
    pub fn new(host: impl Into<String>, port: u16, hello_name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            hello_name: hello_name.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn smtp_error(context: &str, detail: impl std::fmt::Display) -> AppError {
    AppError::ExternalServiceError(format!("SMTP {context}: {detail}"))
}

struct Session {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Session {
    /// Reads a (possibly multi-line) reply and checks its code class.
    async fn expect(&mut self, expected: char, context: &str) -> Result<()> {
        loop {
            let mut line = String::new();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|e| smtp_error(context, e))?;
            if read == 0 {
                return Err(smtp_error(context, "connection closed"));
            }
            debug!(reply = %line.trim_end(), "SMTP");

            if !line.starts_with(expected) {
                return Err(smtp_error(context, line.trim_end()));
            }
            // "250-..." continues, "250 ..." ends the reply
            if line.as_bytes().get(3) != Some(&b'-') {
                return Ok(());
            }
        }
    }

    async fn command(&mut self, line: &str, expected: char, context: &str) -> Result<()> {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .map_err(|e| smtp_error(context, e))?;
        self.expect(expected, context).await
    }
}

/// Rejects addresses that could break out of `MAIL FROM:<..>`/`RCPT TO:<..>`
/// or a header line.
fn check_address(address: &str) -> Result<()> {
    let unsafe_char = |c: char| c.is_control() || c.is_whitespace() || c == '<' || c == '>';
    if address.is_empty() || address.contains(unsafe_char) {
        return Err(smtp_error("address", format!("invalid address {address:?}")));
    }
    Ok(())
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, mail: &Mail) -> Result<()> {
        check_address(&mail.from)?;
        for recipient in &mail.to {
            check_address(recipient)?;
        }

        tokio::time::timeout(self.timeout, self.deliver(mail))
            .await
            .map_err(|_| smtp_error("timeout", format!("no answer within {:?}", self.timeout)))?
    }
}

impl SmtpTransport {
    async fn deliver(&self, mail: &Mail) -> Result<()> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| smtp_error("connect", e))?;
        let (read, write) = stream.into_split();
        let mut session = Session {
            reader: BufReader::new(read),
            writer: write,
        };

        session.expect('2', "greeting").await?;
        session
            .command(&format!("EHLO {}", self.hello_name), '2', "EHLO")
            .await?;
        session
            .command(&format!("MAIL FROM:<{}>", mail.from), '2', "MAIL FROM")
            .await?;
        for recipient in &mail.to {
            session
                .command(&format!("RCPT TO:<{recipient}>"), '2', "RCPT TO")
                .await?;
        }
        session.command("DATA", '3', "DATA").await?;
        session
            .command(&format!("{}\r\n.", message(mail)), '2', "message")
            .await?;
        session.command("QUIT", '2', "QUIT").await
    }
}

/// Plain ASCII without control characters goes out as is; everything else
/// becomes an RFC 2047 encoded word, so line breaks never reach the header.
fn encode_header(value: &str) -> String {
    if value.is_ascii() && !value.contains(|c: char| c.is_ascii_control()) {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

/// Base64 wrapped at 76 columns.
fn wrapped_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    encoded
        .as_bytes()
        .chunks(76)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// Renders the full RFC 5322 message. Recipients go into Bcc-style
/// envelope addresses only; the visible `To` is the sender.
fn message(mail: &Mail) -> String {
    let mut headers = vec![
        format!("From: {}", mail.from),
        format!("To: {}", mail.from),
        format!("Subject: {}", encode_header(&mail.subject)),
        format!("Message-ID: <{}@evendemy>", Uuid::new_v4()),
        "MIME-Version: 1.0".to_string(),
    ];

    let body = wrapped_base64(mail.body.as_bytes());
    let content = match &mail.calendar {
        None => {
            headers.push("Content-Type: text/plain; charset=utf-8".to_string());
            headers.push("Content-Transfer-Encoding: base64".to_string());
            body
        }
        Some(attachment) => {
            let boundary = format!("evendemy-{}", Uuid::new_v4().simple());
            headers.push(format!(
                "Content-Type: multipart/mixed; boundary=\"{boundary}\""
            ));
            [
                format!("--{boundary}"),
                "Content-Type: text/plain; charset=utf-8".to_string(),
                "Content-Transfer-Encoding: base64".to_string(),
                String::new(),
                body,
                format!("--{boundary}"),
                format!(
                    "Content-Type: {}; method=REQUEST; name=\"{}\"",
                    calendar::CONTENT_TYPE,
                    attachment.filename
                ),
                format!(
                    "Content-Disposition: attachment; filename=\"{}\"",
                    attachment.filename
                ),
                "Content-Transfer-Encoding: base64".to_string(),
                String::new(),
                wrapped_base64(attachment.content.as_bytes()),
                format!("--{boundary}--"),
            ]
            .join("\r\n")
        }
    };

    format!("{}\r\n\r\n{}", headers.join("\r\n"), content)
}
