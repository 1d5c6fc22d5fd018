//! Mail submission for the SMS gateway.
//!
//! Messages go out over authenticated SMTP. Well-known providers are
//! selected by service name; any other server is given as host and port.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{debug, info};

use super::NotifyError;

/// Implicit-TLS submission port.
pub const SMTPS_PORT: u16 = 465;
/// STARTTLS submission port.
pub const SUBMISSION_PORT: u16 = 587;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpEndpoint {
    pub host: String,
    pub port: u16,
}

const SERVICES: &[(&str, &str, u16)] = &[
    ("gmail", "smtp.gmail.com", SMTPS_PORT),
    ("outlook", "smtp-mail.outlook.com", SUBMISSION_PORT),
    ("hotmail", "smtp-mail.outlook.com", SUBMISSION_PORT),
    ("office365", "smtp.office365.com", SUBMISSION_PORT),
    ("yahoo", "smtp.mail.yahoo.com", SMTPS_PORT),
    ("icloud", "smtp.mail.me.com", SUBMISSION_PORT),
    ("zoho", "smtp.zoho.com", SMTPS_PORT),
];

/// SMTP server for a well-known service name ("gmail", "Outlook", ...).
pub fn service_endpoint(service: &str) -> Option<SmtpEndpoint> {
    let key = service.trim().to_ascii_lowercase();
    SERVICES
        .iter()
        .find(|(name, _, _)| *name == key)
        .map(|(_, host, port)| SmtpEndpoint {
            host: host.to_string(),
            port: *port,
        })
}

/// Convert to a plain-text RFC 5322 message.
pub fn build_message(message: &MailMessage) -> Result<Message, NotifyError> {
    let from: Mailbox = message
        .from
        .parse()
        .map_err(|e| NotifyError::InvalidAddress(format!("{}: {e}", message.from)))?;
    let to: Mailbox = message
        .to
        .parse()
        .map_err(|e| NotifyError::InvalidAddress(format!("{}: {e}", message.to)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(message.text.clone())
        .map_err(|e| NotifyError::Transport(e.to_string()))
}

/// Authenticated SMTP transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    endpoint: SmtpEndpoint,
}

impl SmtpMailer {
    pub fn new(
        endpoint: &SmtpEndpoint,
        username: &str,
        password: &str,
        timeout_secs: u64,
    ) -> Result<Self, NotifyError> {
        if endpoint.host.trim().is_empty() {
            return Err(NotifyError::NotConfigured("SMTP host".into()));
        }

        let builder = if endpoint.port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&endpoint.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&endpoint.host)
        }
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let transport = builder
            .port(endpoint.port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .timeout(Some(Duration::from_secs(timeout_secs)))
            .build();

        Ok(Self {
            transport,
            endpoint: endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &SmtpEndpoint {
        &self.endpoint
    }

    /// Connect and authenticate without sending anything.
    pub async fn verify(&self) -> Result<(), NotifyError> {
        match self.transport.test_connection().await {
            Ok(true) => {
                info!(host = %self.endpoint.host, port = self.endpoint.port, "SMTP connection verified");
                Ok(())
            }
            Ok(false) => Err(NotifyError::Transport(format!(
                "{} did not accept the connection",
                self.endpoint.host
            ))),
            Err(e) => Err(NotifyError::Transport(e.to_string())),
        }
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), NotifyError> {
        let email = build_message(message)?;
        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        debug!(to = %message.to, code = %response.code(), "Mail accepted by SMTP server");
        Ok(())
    }
}
