//! # SMS Channel
//!
//! HelloSMS-style JSON API backend for notifykit.
//!
//! Messages are POSTed as `{to: [..], from, message, priority}` with HTTP
//! Basic authentication. Connection failures are retried immediately up to
//! `max_retries` times before the error is reported.

use async_trait::async_trait;
use notify_core::{Action, Notification, NotificationChannel, NotificationResult, NotifyError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// SMS channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    /// API username (Basic auth)
    pub username: String,
    /// API password (Basic auth)
    pub password: String,
    /// Sender name used when the request has none (default: TrafikInfo)
    pub sender: String,
    /// Send endpoint
    pub api_url: String,
    /// Per-request timeout in seconds (default: 10)
    pub timeout_secs: u64,
    /// Connection-level retries (default: 3)
    pub max_retries: u32,
    /// Longest accepted message in characters (default: 160)
    pub max_message_length: usize,
    /// Admissions per minute across the whole relay (default: 100)
    pub rate_limit: u32,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            sender: "TrafikInfo".to_string(),
            api_url: "https://api.hellosms.se/api/v1/sms/send".to_string(),
            timeout_secs: 10,
            max_retries: 3,
            max_message_length: 160,
            rate_limit: 100,
        }
    }
}

/// HTTP JSON API SMS client.
#[derive(Clone, Debug)]
pub struct SmsChannel {
    config: SmsConfig,
    http: reqwest::Client,
}

impl SmsChannel {
    pub fn new(config: SmsConfig) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| NotifyError::Config(format!("http client: {}", e)))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &SmsConfig {
        &self.config
    }

    /// POST the payload, re-issuing it while the connection cannot be established.
    async fn post(&self, payload: &SmsSendRequest<'_>) -> Result<serde_json::Value, SendFailure> {
        let mut retries = 0;
        let res = loop {
            let attempt = self
                .http
                .post(&self.config.api_url)
                .basic_auth(&self.config.username, Some(&self.config.password))
                .json(payload)
                .send()
                .await;

            match attempt {
                Ok(res) => break res,
                Err(e) if e.is_connect() && retries < self.config.max_retries => {
                    retries += 1;
                    warn!(
                        "SMS API connection failed ({}/{}): {}",
                        retries, self.config.max_retries, e
                    );
                }
                Err(e) => {
                    let error = if e.is_timeout() || e.is_connect() {
                        NotifyError::Transient(e.to_string())
                    } else {
                        NotifyError::Http(e.to_string())
                    };
                    return Err(SendFailure { error, body: None });
                }
            }
        };

        let status = res.status();
        if !status.is_success() {
            let reason = res
                .error_for_status_ref()
                .err()
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("HTTP {}", status));
            let body = res
                .text()
                .await
                .ok()
                .and_then(|text| serde_json::from_str(&text).ok());
            let error = match status.as_u16() {
                401 | 403 => NotifyError::Auth(reason),
                _ => NotifyError::Protocol(reason),
            };
            return Err(SendFailure { error, body });
        }

        let raw_text = res.text().await.map_err(|e| SendFailure {
            error: NotifyError::Http(e.to_string()),
            body: None,
        })?;
        Ok(serde_json::from_str(&raw_text)
            .unwrap_or_else(|_| serde_json::json!({ "raw": raw_text })))
    }
}

#[derive(Debug, Serialize)]
struct SmsSendRequest<'a> {
    to: [&'a str; 1],
    from: &'a str,
    message: &'a str,
    priority: &'static str,
}

struct SendFailure {
    error: NotifyError,
    body: Option<serde_json::Value>,
}

/// `+` followed by one or more ASCII digits.
fn is_phone_number(to: &str) -> bool {
    to.strip_prefix('+')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

#[async_trait]
impl NotificationChannel for SmsChannel {
    fn action(&self) -> Action {
        Action::Sms
    }

    fn validate(&self, note: &Notification<'_>) -> bool {
        if note.to.is_empty() || note.message.is_empty() {
            return false;
        }
        if note.message.chars().count() > self.config.max_message_length {
            return false;
        }
        is_phone_number(note.to)
    }

    async fn send(&self, note: &Notification<'_>) -> NotificationResult {
        let payload = SmsSendRequest {
            to: [note.to],
            from: note
                .from
                .filter(|from| !from.is_empty())
                .unwrap_or(&self.config.sender),
            message: note.message,
            priority: "high",
        };
        debug!("Sending SMS to {} from {}", note.to, payload.from);

        match self.post(&payload).await {
            Ok(raw) => {
                info!("SMS sent to {}", note.to);
                NotificationResult::success(format!("SMS sent to {}", note.to), Some(raw))
            }
            Err(failure) => {
                warn!("SMS to {} failed: {}", note.to, failure.error);
                NotificationResult::error(failure.error.to_string(), failure.body)
            }
        }
    }
}
