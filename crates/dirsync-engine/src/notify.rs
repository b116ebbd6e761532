//! Operator notifications.
//!
//! Delivery is fire-and-forget: a failing sink is logged and never
//! interrupts the caller.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Submission port used when none is configured.
pub const DEFAULT_SMTP_PORT: u16 = 587;

const MAIL_SUBJECT: &str = "Synchronizer Warning";
const SENDER_NAME: &str = "Directory Synchronizer";

/// A named alert, e.g. the error type and its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub name: String,
    pub message: String,
}

impl Notification {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Destination for operator notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a notification. Never fails.
    async fn notify(&self, notification: Notification);
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, notification: Notification) {
        error!(
            name = %notification.name,
            message = %notification.message,
            "Notification"
        );
    }
}

/// Posts notifications as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a notifier for `url` with a 10 second request timeout.
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("dirsync/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn notify(&self, notification: Notification) {
        let result = self
            .client
            .post(&self.url)
            .json(&notification)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(name = %notification.name, "Notification delivered");
            }
            Ok(response) => {
                warn!(
                    name = %notification.name,
                    status = response.status().as_u16(),
                    "Notification endpoint rejected delivery"
                );
            }
            Err(e) => {
                let error_msg = if e.is_timeout() {
                    "Request timeout (10s)".to_string()
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };
                warn!(name = %notification.name, error = %error_msg, "Notification delivery failed");
            }
        }
    }
}

/// Mail relay settings for [`SmtpNotifier`].
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender address, optionally as `Name <address>`.
    pub from: String,
    pub to: Vec<String>,
}

impl SmtpSettings {
    pub fn new(host: impl Into<String>, from: impl Into<String>, to: Vec<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SMTP_PORT,
            username: None,
            password: None,
            from: from.into(),
            to,
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

/// Errors building an [`SmtpNotifier`].
#[derive(Debug, Error)]
pub enum SmtpNotifierError {
    #[error("invalid mail address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("no notification recipients configured")]
    NoRecipients,

    #[error("SMTP transport setup failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Mails notifications through an SMTP relay.
///
/// The connection is upgraded with STARTTLS when the relay offers it. The
/// body is the notification as JSON.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl SmtpNotifier {
    pub fn new(settings: &SmtpSettings) -> Result<Self, SmtpNotifierError> {
        let mut from = parse_mailbox(&settings.from)?;
        if from.name.is_none() {
            from.name = Some(SENDER_NAME.to_string());
        }

        let to = settings
            .to
            .iter()
            .map(|address| parse_mailbox(address))
            .collect::<Result<Vec<_>, _>>()?;
        if to.is_empty() {
            return Err(SmtpNotifierError::NoRecipients);
        }

        let tls = TlsParameters::new(settings.host.clone())?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
            .port(settings.port)
            .tls(Tls::Opportunistic(tls))
            .timeout(Some(Duration::from_secs(10)));
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
        })
    }

    /// Render `notification` as a mail message.
    pub fn message(&self, notification: &Notification) -> Result<Message, lettre::error::Error> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(MAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        builder.body(serde_json::to_string(notification).unwrap_or_default())
    }
}

impl fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, SmtpNotifierError> {
    address
        .trim()
        .parse::<Mailbox>()
        .map_err(|source| SmtpNotifierError::InvalidAddress {
            address: address.to_string(),
            source,
        })
}

#[async_trait]
impl NotificationSink for SmtpNotifier {
    async fn notify(&self, notification: Notification) {
        let message = match self.message(&notification) {
            Ok(message) => message,
            Err(e) => {
                warn!(name = %notification.name, error = %e, "Failed to build notification mail");
                return;
            }
        };

        match self.transport.send(message).await {
            Ok(_) => info!(name = %notification.name, recipients = self.to.len(), "Notification mailed"),
            Err(e) => {
                warn!(name = %notification.name, error = %e, "Notification mail delivery failed");
            }
        }
    }
}
