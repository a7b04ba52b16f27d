//! Mail transport.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use parking_lot::RwLock;
use std::time::Duration;

use crate::core::config::EmailSettings;
use crate::error::{HostwatchError, Result};

/// Upper bound for one SMTP conversation
pub const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers a rendered message to a list of recipients
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, html_body: &str, recipients: &[String]) -> Result<()>;

    /// Pick up changed email settings; transports without settings ignore this
    fn reconfigure(&self, _settings: &EmailSettings) {}
}

/// Sends HTML mail through an SMTP relay with STARTTLS
pub struct SmtpNotifier {
    settings: RwLock<EmailSettings>,
}

impl SmtpNotifier {
    pub fn new(settings: EmailSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    fn transport(settings: &EmailSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        if settings.smtp_server.is_empty() {
            return Err(HostwatchError::transport("SMTP server is not configured"));
        }

        let creds = Credentials::new(settings.from.clone(), settings.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_server)
            .map_err(|e| {
                HostwatchError::transport(format!(
                    "invalid SMTP relay {}: {}",
                    settings.smtp_server, e
                ))
            })?
            .port(settings.smtp_port)
            .credentials(creds)
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(transport)
    }

    /// Connect and authenticate without sending anything
    pub async fn test_connection(&self) -> Result<()> {
        let settings = self.settings.read().clone();
        let transport = Self::transport(&settings)?;

        match transport.test_connection().await {
            Ok(true) => Ok(()),
            Ok(false) => Err(HostwatchError::transport(format!(
                "{}:{} did not accept the connection",
                settings.smtp_server, settings.smtp_port
            ))),
            Err(e) => Err(HostwatchError::transport(format!(
                "connection to {}:{} failed: {}",
                settings.smtp_server, settings.smtp_port, e
            ))),
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| HostwatchError::transport(format!("invalid address '{}': {}", address, e)))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, subject: &str, html_body: &str, recipients: &[String]) -> Result<()> {
        let settings = self.settings.read().clone();

        if recipients.is_empty() {
            return Err(HostwatchError::transport("no recipients configured"));
        }

        let mut builder = Message::builder()
            .from(parse_mailbox(&settings.from)?)
            .subject(subject)
            .header(ContentType::TEXT_HTML);
        for recipient in recipients {
            builder = builder.to(parse_mailbox(recipient)?);
        }

        let message = builder
            .body(html_body.to_string())
            .map_err(|e| HostwatchError::transport(format!("failed to build message: {}", e)))?;

        let transport = Self::transport(&settings)?;
        transport
            .send(message)
            .await
            .map_err(|e| HostwatchError::transport(format!("failed to send '{}': {}", subject, e)))?;

        log::info!("Email sent with subject: {}", subject);
        Ok(())
    }

    fn reconfigure(&self, settings: &EmailSettings) {
        *self.settings.write() = settings.clone();
    }
}

/// Writes messages to the log instead of sending them
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, html_body: &str, recipients: &[String]) -> Result<()> {
        log::info!("[alert] {} -> {}", subject, recipients.join(", "));
        log::debug!("[alert] body:\n{}", html_body);
        Ok(())
    }
}
