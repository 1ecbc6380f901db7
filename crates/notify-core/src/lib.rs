//! # Notify Core
//!
//! Core traits and types for the notifykit delivery relay.
//!
//! This crate provides the building blocks shared by every channel:
//! - [`NotificationChannel`] trait for validating and delivering a message
//! - [`ChannelRegistry`] for selecting a channel by [`Action`]
//! - Common types for requests, results, audit entries and errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use notify_core::{Notification, NotificationChannel};
//!
//! let note = Notification {
//!     to: "+46701234567",
//!     message: "Hello world!",
//!     subject: None,
//!     from: None,
//! };
//! if channel.validate(&note) {
//!     let result = channel.send(&note).await;
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use time::OffsetDateTime;

/// Subject used for email when the caller does not provide one.
pub const DEFAULT_SUBJECT: &str = "Notifiering";

/// Requester id recorded when the caller does not identify itself.
pub const DEFAULT_REQUESTER: &str = "anonymous";

/// Errors that can occur while configuring or talking to a transport
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// HTTP communication error
    #[error("http error: {0}")]
    Http(String),
    /// Authentication/authorization error
    #[error("authentication error: {0}")]
    Auth(String),
    /// Connection dropped, timed out or failed the TLS handshake
    #[error("transient error: {0}")]
    Transient(String),
    /// Transport rejected the request at the protocol level
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Channel cannot be constructed from the given configuration
    #[error("configuration error: {0}")]
    Config(String),
    /// Unexpected error occurred
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl NotifyError {
    /// Whether retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, NotifyError::Transient(_))
    }
}

/// Delivery mechanism requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Sms,
    Email,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Sms => "sms",
            Action::Email => "email",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sms" => Ok(Action::Sms),
            "email" => Ok(Action::Email),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// HTTP status code for relay responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    BadRequest = 400,
    TooManyRequests = 429,
    InternalServerError = 500,
}

impl HttpStatus {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Raw inbound body as posted to the relay. Every field is optional so that
/// missing fields can be reported as a validation error instead of a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendPayload {
    pub action: Option<String>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub message: Option<String>,
    pub subject: Option<String>,
    pub id: Option<String>,
}

/// A validated, normalized request owned by a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub action: Action,
    pub recipient: String,
    pub sender: Option<String>,
    pub message: String,
    pub subject: String,
    pub requester_id: String,
}

impl NotificationRequest {
    /// Borrowed view handed to a channel.
    pub fn as_notification(&self) -> Notification<'_> {
        Notification {
            to: &self.recipient,
            message: &self.message,
            subject: Some(&self.subject),
            from: self.sender.as_deref(),
        }
    }
}

/// What a channel needs to validate and deliver one message.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Notification<'a> {
    pub to: &'a str,
    pub message: &'a str,
    pub subject: Option<&'a str>,
    pub from: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Error,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::Error => "error",
        }
    }
}

/// Outcome of a single `send`, produced by a channel and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationResult {
    pub status: DeliveryStatus,
    pub detail: String,
    /// Raw transport payload for debugging / audit.
    #[serde(rename = "response", skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
}

impl NotificationResult {
    pub fn success(detail: impl Into<String>, raw_response: Option<serde_json::Value>) -> Self {
        Self {
            status: DeliveryStatus::Success,
            detail: detail.into(),
            raw_response,
        }
    }

    pub fn error(detail: impl Into<String>, raw_response: Option<serde_json::Value>) -> Self {
        Self {
            status: DeliveryStatus::Error,
            detail: detail.into(),
            raw_response,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

/// Durable record of a dispatch attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub action: Action,
    #[serde(rename = "to")]
    pub recipient: String,
    #[serde(rename = "from")]
    pub sender: String,
    pub subject: String,
    pub status: DeliveryStatus,
    #[serde(rename = "id")]
    pub requester_id: String,
}

impl AuditEntry {
    pub fn record(request: &NotificationRequest, result: &NotificationResult) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            action: request.action,
            recipient: request.recipient.clone(),
            sender: request.sender.clone().unwrap_or_default(),
            subject: request.subject.clone(),
            status: result.status,
            requester_id: request.requester_id.clone(),
        }
    }
}

/// Framework-agnostic response that can be converted to any framework's response type
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: HttpStatus,
    pub body: String,
    pub content_type: String,
}

impl RelayResponse {
    pub fn json<T: Serialize>(status: HttpStatus, body: &T) -> Self {
        Self {
            status,
            body: serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string()),
            content_type: "application/json".to_string(),
        }
    }

    pub fn error(status: HttpStatus, message: &str) -> Self {
        Self::json(
            status,
            &serde_json::json!({ "status": DeliveryStatus::Error, "error": message }),
        )
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Action this channel serves, e.g. `Action::Sms`.
    fn action(&self) -> Action;

    /// Cheap local check that rejects malformed input before any I/O.
    fn validate(&self, note: &Notification<'_>) -> bool;

    /// Deliver the message. Failures are reported in the result, never as a panic or `Err`.
    async fn send(&self, note: &Notification<'_>) -> NotificationResult;
}

/// Request handling entry point, implemented by the dispatcher and called by web adapters.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn relay(&self, payload: SendPayload) -> RelayResponse;
}

/// Runtime registry so apps can register any combination of channels and select them by action.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    map: Arc<HashMap<Action, Arc<dyn NotificationChannel>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            map: Arc::new(HashMap::new()),
        }
    }

    pub fn with(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        let mut m = (*self.map).clone();
        m.insert(channel.action(), channel);
        self.map = Arc::new(m);
        self
    }

    pub fn get(&self, action: Action) -> Option<Arc<dyn NotificationChannel>> {
        self.map.get(&action).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullChannel;

    #[async_trait]
    impl NotificationChannel for NullChannel {
        fn action(&self) -> Action {
            Action::Email
        }

        fn validate(&self, _note: &Notification<'_>) -> bool {
            true
        }

        async fn send(&self, _note: &Notification<'_>) -> NotificationResult {
            NotificationResult::success("ok", None)
        }
    }

    #[test]
    fn action_parses_known_names_only() {
        assert_eq!("sms".parse::<Action>(), Ok(Action::Sms));
        assert_eq!("email".parse::<Action>(), Ok(Action::Email));
        assert_eq!(
            "fax".parse::<Action>(),
            Err(UnknownAction("fax".to_string()))
        );
        assert!("SMS".parse::<Action>().is_err());
    }

    #[test]
    fn registry_selects_by_action() {
        let registry = ChannelRegistry::new().with(Arc::new(NullChannel));
        assert!(registry.get(Action::Email).is_some());
        assert!(registry.get(Action::Sms).is_none());
    }

    #[test]
    fn audit_entry_uses_wire_names() {
        let request = NotificationRequest {
            action: Action::Sms,
            recipient: "+46701234567".into(),
            sender: Some("TrafikInfo".into()),
            message: "Test".into(),
            subject: DEFAULT_SUBJECT.into(),
            requester_id: DEFAULT_REQUESTER.into(),
        };
        let result = NotificationResult::success("sent", None);
        let entry = AuditEntry::record(&request, &result);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["action"], "sms");
        assert_eq!(json["to"], "+46701234567");
        assert_eq!(json["from"], "TrafikInfo");
        assert_eq!(json["subject"], "Notifiering");
        assert_eq!(json["status"], "success");
        assert_eq!(json["id"], "anonymous");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn result_omits_missing_raw_response() {
        let json = serde_json::to_value(NotificationResult::error("boom", None)).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["detail"], "boom");
        assert!(json.get("response").is_none());
    }

    #[test]
    fn error_response_is_json() {
        let response = RelayResponse::error(HttpStatus::TooManyRequests, "rate limit exceeded");
        assert_eq!(response.status.as_u16(), 429);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "rate limit exceeded");
    }
}
