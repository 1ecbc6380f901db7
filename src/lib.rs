//! # Notify Kit
//!
//! An SMS and email notification relay for Rust.
//!
//! ## Features
//!
//! - **Two channels**: SMS over an HTTP JSON API, email over SMTP
//! - **Validation first**: malformed recipients are rejected before any I/O
//! - **Retries**: connection-level retry for SMS, fixed-delay retry for SMTP
//! - **Rate limiting**: one sliding-window budget shared by every request
//! - **Audit log**: every dispatch is recorded in a daily-rotated log file
//! - **Configuration**: files plus environment variables
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use notifykit::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let channels = ChannelRegistry::new()
//!         .with(Arc::new(SmsChannel::new(config.sms.clone())?))
//!         .with(Arc::new(EmailChannel::new(config.email.clone())?));
//!     let dispatcher = Dispatcher::new(
//!         Arc::new(RateLimiter::default()),
//!         channels,
//!         config.sms.rate_limit,
//!     );
//!
//!     let report = dispatcher
//!         .dispatch(SendPayload {
//!             action: Some("sms".into()),
//!             to: Some("+46701234567".into()),
//!             message: Some("Hello from Notify Kit!".into()),
//!             ..SendPayload::default()
//!         })
//!         .await?;
//!     println!("{}: {}", report.result.status.as_str(), report.result.detail);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust,ignore
//! use notifykit::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! println!("Rate limit: {} requests per minute", config.sms.rate_limit);
//! ```

pub mod audit;
pub mod config;
pub mod dispatcher;
pub mod logging;
pub mod rate_limiter;

pub use crate::config::*;

/// Errors raised while assembling the relay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration: {0}")]
    Config(#[from] ::config::ConfigError),
    #[error("channel: {0}")]
    Channel(#[from] notify_core::NotifyError),
    #[error("logging: {0}")]
    Logging(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Common imports for Notify Kit usage
pub mod prelude {
    pub use crate::audit::{AuditSink, TracingAuditSink};
    pub use crate::config::{AppConfig, LoggingConfig, ServerConfig};
    pub use crate::dispatcher::{DispatchError, DispatchReport, Dispatcher};
    pub use crate::rate_limiter::RateLimiter;
    pub use notify_core::*;
    pub use notify_email::{EmailChannel, EmailConfig, MailTransport};
    pub use notify_sms::{SmsChannel, SmsConfig};
}
