use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{SmtpConfig, TlsMode};

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
    pub reply_to: String,
    pub bcc: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MailError {
    InvalidAddress(String),
    Build(String),
    /// Network trouble or a 4xx reply; worth retrying later.
    Transient(String),
    Permanent(String),
}

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::InvalidAddress(msg) => write!(f, "Invalid address: {msg}"),
            MailError::Build(msg) => write!(f, "Failed to build email: {msg}"),
            MailError::Transient(msg) => write!(f, "SMTP error (transient): {msg}"),
            MailError::Permanent(msg) => write!(f, "SMTP error: {msg}"),
        }
    }
}

impl std::error::Error for MailError {}

/// Delivers one message per call. Failures come back as `MailError` so the caller can
/// record them against the contact.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let from = match &config.from_name {
            Some(name) => format!("{name} <{}>", config.user),
            None => config.user.clone(),
        };
        let from: Mailbox = from
            .parse()
            .map_err(|e| format!("Invalid sender address: {e}"))?;

        Ok(Self {
            transport: build_smtp_transport(config)?,
            from,
        })
    }
}

pub fn build_smtp_transport(
    config: &SmtpConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
    let creds = Credentials::new(config.user.clone(), config.pass.clone());
    let timeout = Some(Duration::from_secs(60));

    let transport = match config.tls_mode {
        TlsMode::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| format!("SMTP relay error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .timeout(timeout)
            .build(),
        TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .credentials(creds)
            .timeout(timeout)
            .build(),
        TlsMode::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| format!("SMTP starttls error: {e}"))?
            .port(config.port)
            .credentials(creds)
            .timeout(timeout)
            .build(),
    };

    Ok(transport)
}

pub fn guess_content_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Assemble the MIME message: plain-text body plus optional attachment, replies and a
/// blind copy routed to the operator.
pub fn build_message(from: &Mailbox, email: &OutgoingEmail) -> Result<Message, MailError> {
    let parse = |addr: &str| -> Result<Mailbox, MailError> {
        addr.parse()
            .map_err(|e| MailError::InvalidAddress(format!("{addr}: {e}")))
    };

    let builder = Message::builder()
        .from(from.clone())
        .to(parse(&email.to)?)
        .reply_to(parse(&email.reply_to)?)
        .bcc(parse(&email.bcc)?)
        .subject(email.subject.as_str());

    let text = SinglePart::builder()
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone());

    let message = match &email.attachment {
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| MailError::Build(format!("Invalid attachment type: {e}")))?;
            let part = MailAttachment::new(attachment.filename.clone())
                .body(attachment.data.clone(), content_type);
            builder.multipart(MultiPart::mixed().singlepart(text).singlepart(part))
        }
        None => builder.singlepart(text),
    };

    message.map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = build_message(&self.from, email)?;

        self.transport.send(message).await.map_err(|e| {
            if e.is_permanent() {
                MailError::Permanent(e.to_string())
            } else {
                MailError::Transient(e.to_string())
            }
        })?;

        Ok(())
    }
}
