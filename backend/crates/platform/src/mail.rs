//! Outbound Mail Capability
//!
//! Delivery is abstracted behind [`MailSender`]; the transport settings travel
//! with each message so one sender can serve several configured identities.
//! [`SmtpMailSender`] delivers over SMTP. [`LogMailSender`] is the local
//! development sender: it records the recipient and subject and never the
//! body, which may carry a credential.

use std::fmt;

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

/// Port served with implicit TLS; every other port upgrades with STARTTLS
const SMTPS_PORT: u16 = 465;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mail transport is not configured")]
    NotConfigured,

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

// ============================================================================
// Transport Settings
// ============================================================================

/// SMTP-style transport settings: sender identity, credentials and endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct MailTransport {
    pub from: String,
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl MailTransport {
    /// Host and port joined for connection strings and log fields
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for MailTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailTransport")
            .field("from", &self.from)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

// ============================================================================
// Message
// ============================================================================

#[derive(Clone)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

impl fmt::Debug for MailMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailMessage")
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("body", &"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Sender Trait
// ============================================================================

/// Mail delivery abstraction
#[trait_variant::make(MailSender: Send)]
pub trait LocalMailSender {
    /// Deliver a message or return an error describing the transport failure
    async fn send(&self, message: &MailMessage, transport: &MailTransport)
    -> Result<(), MailError>;
}

/// SMTP sender, one connection per message
#[derive(Debug, Clone, Copy, Default)]
pub struct SmtpMailSender;

impl SmtpMailSender {
    fn build_message(message: &MailMessage, transport: &MailTransport) -> Result<Message, MailError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|_| MailError::InvalidRecipient(message.to.clone()))?;
        let from: Mailbox = transport
            .from
            .parse()
            .map_err(|e| MailError::Delivery(format!("invalid sender address: {e}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| MailError::Delivery(e.to_string()))
    }

    fn build_transport(
        transport: &MailTransport,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let builder = if transport.port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&transport.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&transport.host)
        }
        .map_err(|e| MailError::Delivery(e.to_string()))?
        .port(transport.port);

        let builder = if transport.username.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                transport.username.clone(),
                transport.password.clone(),
            ))
        };

        Ok(builder.build())
    }
}

impl MailSender for SmtpMailSender {
    async fn send(&self, message: &MailMessage, transport: &MailTransport) -> Result<(), MailError> {
        let email = Self::build_message(message, transport)?;
        let smtp = Self::build_transport(transport)?;

        smtp.send(email)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;

        info!(to = %message.to, endpoint = %transport.endpoint(), "Mail sent");
        Ok(())
    }
}

/// Development sender that logs instead of delivering
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailSender;

impl MailSender for LogMailSender {
    async fn send(&self, message: &MailMessage, transport: &MailTransport) -> Result<(), MailError> {
        if !message.to.contains('@') {
            return Err(MailError::InvalidRecipient(message.to.clone()));
        }

        info!(
            to = %message.to,
            subject = %message.subject,
            from = %transport.from,
            endpoint = %transport.endpoint(),
            "Mail send stub"
        );
        Ok(())
    }
}
