//! # Email Channel
//!
//! SMTP backend for notifykit.
//!
//! ## Features
//!
//! - STARTTLS with certificate verification (unverified is an explicit opt-in)
//! - Login with configured credentials
//! - Retry with a fixed delay on dropped connections, timeouts and TLS failures
//! - Authentication and protocol rejections reported without retrying
//!
//! ## Example
//!
//! ```rust,ignore
//! use notify_email::{EmailChannel, EmailConfig};
//!
//! let channel = EmailChannel::new(EmailConfig {
//!     smtp_server: "smtp.example.com".into(),
//!     username: "relay@example.com".into(),
//!     password: "secret".into(),
//!     ..EmailConfig::default()
//! })?;
//! ```

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use notify_core::{
    Action, Notification, NotificationChannel, NotificationResult, NotifyError, DEFAULT_SUBJECT,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub use lettre::Message;

/// Connection timeout for a single SMTP session.
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// SMTP reply codes that mean the login was refused.
const AUTH_FAILURE_CODES: [&str; 3] = ["530", "534", "535"];

/// Email channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// SMTP server host.
    pub smtp_server: String,
    /// SMTP server port (default: 587).
    pub smtp_port: u16,
    /// SMTP username.
    pub username: String,
    /// SMTP password.
    pub password: String,
    /// Sender address used when the request has none. Falls back to the username.
    pub sender: String,
    /// Attempts before giving up on transient failures (default: 3).
    pub max_retries: u32,
    /// Delay between attempts in seconds (default: 5).
    pub retry_delay_secs: u64,
    /// Skip certificate verification during STARTTLS (default: false).
    pub accept_invalid_certs: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_server: "localhost".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            sender: String::new(),
            max_retries: 3,
            retry_delay_secs: 5,
            accept_invalid_certs: false,
        }
    }
}

impl EmailConfig {
    fn default_sender(&self) -> &str {
        if self.sender.is_empty() {
            &self.username
        } else {
            &self.sender
        }
    }
}

/// One SMTP session: connect, STARTTLS, login, transmit.
///
/// Implementations classify failures so the channel can decide whether to retry:
/// [`NotifyError::Transient`] is retried, everything else is final.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: Message) -> Result<(), NotifyError>;
}

/// `lettre`-backed SMTP transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, NotifyError> {
        if config.accept_invalid_certs {
            warn!(
                "TLS certificate verification disabled for {}",
                config.smtp_server
            );
        }
        let tls = TlsParameters::builder(config.smtp_server.clone())
            .dangerous_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| NotifyError::Config(format!("tls parameters: {}", e)))?;

        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.smtp_server.as_str())
                .port(config.smtp_port)
                .tls(Tls::Required(tls))
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .timeout(Some(SMTP_TIMEOUT))
                .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn deliver(&self, message: Message) -> Result<(), NotifyError> {
        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(classify)
    }
}

/// Sort an SMTP failure into the retry taxonomy.
fn classify(err: lettre::transport::smtp::Error) -> NotifyError {
    // Negative replies carry a code; everything else failed below the reply level.
    if let Some(code) = err.status() {
        let code = code.to_string();
        return if AUTH_FAILURE_CODES.contains(&code.as_str()) {
            NotifyError::Auth(err.to_string())
        } else {
            NotifyError::Protocol(err.to_string())
        };
    }
    // A reply cut short means the server hung up mid-session.
    if err.is_timeout() || err.is_tls() || err.is_response() || err.is_transport_shutdown() {
        return NotifyError::Transient(err.to_string());
    }
    if err.is_client() {
        return NotifyError::Unexpected(err.to_string());
    }
    match io_error_kind(&err) {
        // Refused connections, unresolvable hosts and the like will not heal on retry.
        Some(kind) if !is_dropped_connection(kind) => NotifyError::Unexpected(err.to_string()),
        _ => NotifyError::Transient(err.to_string()),
    }
}

fn io_error_kind(err: &(dyn std::error::Error + 'static)) -> Option<io::ErrorKind> {
    let mut source = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        source = e.source();
    }
    None
}

fn is_dropped_connection(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

/// Email notification channel.
pub struct EmailChannel {
    config: EmailConfig,
    transport: Arc<dyn MailTransport>,
    address: Regex,
}

impl EmailChannel {
    /// Create a channel that talks to the configured SMTP server.
    pub fn new(config: EmailConfig) -> Result<Self, NotifyError> {
        check_credentials(&config)?;
        let transport = SmtpMailer::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a channel over any transport, e.g. a scripted one in tests.
    pub fn with_transport(
        config: EmailConfig,
        transport: Arc<dyn MailTransport>,
    ) -> Result<Self, NotifyError> {
        check_credentials(&config)?;
        let address = Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$")
            .map_err(|e| NotifyError::Config(format!("address pattern: {}", e)))?;
        Ok(Self {
            config,
            transport,
            address,
        })
    }

    pub fn config(&self) -> &EmailConfig {
        &self.config
    }

    fn compose(&self, note: &Notification<'_>) -> Result<Message, NotifyError> {
        let from = note
            .from
            .filter(|from| !from.is_empty())
            .unwrap_or(self.config.default_sender());
        let from: Mailbox = from
            .parse()
            .map_err(|e| NotifyError::Unexpected(format!("sender {}: {}", from, e)))?;
        let to: Mailbox = note
            .to
            .parse()
            .map_err(|e| NotifyError::Unexpected(format!("recipient {}: {}", note.to, e)))?;
        let subject = note
            .subject
            .filter(|subject| !subject.is_empty())
            .unwrap_or(DEFAULT_SUBJECT);

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(note.message.to_string())
            .map_err(|e| NotifyError::Unexpected(e.to_string()))
    }
}

fn check_credentials(config: &EmailConfig) -> Result<(), NotifyError> {
    if config.username.is_empty() || config.password.is_empty() {
        return Err(NotifyError::Config("SMTP credentials missing".to_string()));
    }
    Ok(())
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn action(&self) -> Action {
        Action::Email
    }

    fn validate(&self, note: &Notification<'_>) -> bool {
        self.address.is_match(note.to) && !note.message.is_empty()
    }

    async fn send(&self, note: &Notification<'_>) -> NotificationResult {
        let message = match self.compose(note) {
            Ok(message) => message,
            Err(e) => {
                error!("Could not build email to {}: {}", note.to, e);
                return NotificationResult::error(e.to_string(), None);
            }
        };

        let max_retries = self.config.max_retries;
        let delay = Duration::from_secs(self.config.retry_delay_secs);
        let mut retries = 0;

        while retries < max_retries {
            match self.transport.deliver(message.clone()).await {
                Ok(()) => {
                    info!("Email sent to {}", note.to);
                    return NotificationResult::success(format!("email sent to {}", note.to), None);
                }
                Err(e) if e.is_transient() => {
                    retries += 1;
                    warn!("Connection error ({}/{}): {}", retries, max_retries, e);
                    if retries < max_retries {
                        debug!("Retrying email to {} in {:?}", note.to, delay);
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(NotifyError::Auth(reason)) => {
                    error!("SMTP authentication failed: {}", reason);
                    return NotificationResult::error(
                        format!("SMTP authentication failed: {}", reason),
                        None,
                    );
                }
                Err(NotifyError::Protocol(reason)) => {
                    error!("SMTP error: {}", reason);
                    return NotificationResult::error(format!("SMTP error: {}", reason), None);
                }
                Err(e) => {
                    error!("Email to {} failed: {}", note.to, e);
                    return NotificationResult::error(e.to_string(), None);
                }
            }
        }

        NotificationResult::error("max retries exceeded", None)
    }
}
