//! SMTP delivery via lettre.
//!
//! Two relay modes: the platform default (taken from environment, used when
//! a user has no custom relay) and a per-user configured relay carried in
//! [`SmtpRelayConfig`] — host, port, credentials and encryption mode.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MessageTransport, OutgoingMessage};
use crate::error::CertiflowError;

/// Connection security for a configured relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SmtpEncryption {
    /// Implicit TLS on connect (usually port 465).
    Ssl,
    /// STARTTLS upgrade (usually port 587).
    #[default]
    Tls,
    /// Plaintext, for local relays and test sinks.
    None,
}

/// A user-configured SMTP relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpRelayConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from_email: String,
    pub from_name: String,
    #[serde(default)]
    pub encryption: SmtpEncryption,
}

impl SmtpRelayConfig {
    /// Platform-default relay from `SMTP_*` environment variables, used when
    /// a user has no custom relay configured.
    pub fn from_env() -> Result<Self, CertiflowError> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| CertiflowError::Precondition(format!("{name} not set")))
        };
        Ok(Self {
            host: var("SMTP_HOST")?,
            port: std::env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .map_err(|e| CertiflowError::Precondition(format!("invalid SMTP_PORT: {e}")))?,
            user: std::env::var("SMTP_USER").unwrap_or_default(),
            pass: std::env::var("SMTP_PASS").unwrap_or_default(),
            from_email: var("SMTP_FROM_EMAIL")?,
            from_name: std::env::var("SMTP_FROM_NAME")
                .unwrap_or_else(|_| "CertiFlow".to_string()),
            encryption: match std::env::var("SMTP_ENCRYPTION").as_deref() {
                Ok("SSL") => SmtpEncryption::Ssl,
                Ok("NONE") => SmtpEncryption::None,
                _ => SmtpEncryption::Tls,
            },
        })
    }
}

/// lettre-backed SMTP transport.
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpTransport").field("from", &self.from).finish()
    }
}

impl SmtpTransport {
    /// Build a transport for the given relay.
    pub fn new(config: &SmtpRelayConfig) -> Result<Self, CertiflowError> {
        let relay_error =
            |e: lettre::transport::smtp::Error| CertiflowError::TransportRejected(e.to_string());

        let mut builder = match config.encryption {
            SmtpEncryption::Ssl => {
                AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host).map_err(relay_error)?
            }
            SmtpEncryption::Tls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(relay_error)?
            }
            SmtpEncryption::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
        };
        builder = builder.port(config.port);
        if !config.user.is_empty() {
            builder =
                builder.credentials(Credentials::new(config.user.clone(), config.pass.clone()));
        }

        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| {
                CertiflowError::Precondition(format!("invalid from address: {e}"))
            })?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, message: &OutgoingMessage) -> Result<Message, CertiflowError> {
        let to: Mailbox = message.to.parse().map_err(|e| {
            CertiflowError::TransportRejected(format!("invalid recipient address: {e}"))
        })?;

        let attachment_type = if message.attachment_name.ends_with(".pdf") {
            ContentType::parse("application/pdf")
        } else {
            ContentType::parse("image/png")
        }
        .map_err(|e| CertiflowError::TransportRejected(format!("attachment type: {e}")))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&message.subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(message.body.clone()))
                    .singlepart(
                        Attachment::new(message.attachment_name.clone())
                            .body(message.attachment.clone(), attachment_type),
                    ),
            )
            .map_err(|e| CertiflowError::TransportRejected(format!("message build: {e}")))
    }
}

#[async_trait]
impl MessageTransport for SmtpTransport {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), CertiflowError> {
        let email = self.build_message(message)?;
        debug!(to = %message.to, "submitting message to SMTP relay");
        self.transport
            .send(email)
            .await
            .map_err(|e| CertiflowError::TransportRejected(e.to_string()))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
