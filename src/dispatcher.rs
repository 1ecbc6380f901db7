//! Request handling core.
//!
//! A dispatch runs: admission check, required fields, channel selection,
//! channel validation, send, audit. The first failing step ends it.

use async_trait::async_trait;
use notify_core::{
    Action, AuditEntry, ChannelRegistry, HttpStatus, NotificationRequest, NotificationResult,
    Relay, RelayResponse, SendPayload, DEFAULT_REQUESTER, DEFAULT_SUBJECT,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn, Span};
use uuid::Uuid;

use crate::audit::{AuditSink, TracingAuditSink};
use crate::rate_limiter::RateLimiter;

/// Reasons a request is turned away before or instead of being sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("missing fields (to, message, action)")]
    MissingFields,
    #[error("invalid action: {0}")]
    UnknownAction(String),
    #[error("no channel configured for {0}")]
    ChannelUnavailable(Action),
    #[error("{}", invalid_input_message(.0))]
    InvalidRecipient(Action),
}

fn invalid_input_message(action: &Action) -> &'static str {
    match action {
        Action::Sms => "invalid phone number or message",
        Action::Email => "invalid email address or message",
    }
}

impl DispatchError {
    pub fn status(&self) -> HttpStatus {
        match self {
            DispatchError::RateLimited => HttpStatus::TooManyRequests,
            _ => HttpStatus::BadRequest,
        }
    }
}

/// Channel result merged with the audit entry written for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    #[serde(flatten)]
    pub result: NotificationResult,
    pub log: AuditEntry,
}

/// Shared by every request handler; cheap to wrap in an `Arc`.
pub struct Dispatcher {
    limiter: Arc<RateLimiter>,
    channels: ChannelRegistry,
    rate_limit: u32,
    audit: Arc<dyn AuditSink>,
}

impl Dispatcher {
    /// `rate_limit` is the single admission budget for all channels.
    pub fn new(limiter: Arc<RateLimiter>, channels: ChannelRegistry, rate_limit: u32) -> Self {
        Self {
            limiter,
            channels,
            rate_limit,
            audit: Arc::new(TracingAuditSink),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    #[instrument(skip_all, fields(dispatch_id = %Uuid::new_v4(), action = tracing::field::Empty))]
    pub async fn dispatch(&self, payload: SendPayload) -> Result<DispatchReport, DispatchError> {
        let to = payload.to.as_deref().map(str::trim).unwrap_or_default();
        let from = payload.from.as_deref().map(str::trim).unwrap_or_default();

        if !self.limiter.admit(self.rate_limit) {
            return Err(DispatchError::RateLimited);
        }

        let action = payload.action.as_deref().unwrap_or_default();
        let message = payload.message.unwrap_or_default();
        if action.is_empty() || to.is_empty() || message.is_empty() {
            debug!("Rejecting request with missing fields");
            return Err(DispatchError::MissingFields);
        }

        let action: Action = action
            .parse()
            .map_err(|_| DispatchError::UnknownAction(action.to_string()))?;
        Span::current().record("action", action.as_str());

        let channel = self
            .channels
            .get(action)
            .ok_or(DispatchError::ChannelUnavailable(action))?;

        let request = NotificationRequest {
            action,
            recipient: to.to_string(),
            sender: (!from.is_empty()).then(|| from.to_string()),
            message,
            subject: payload.subject.unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
            requester_id: payload.id.unwrap_or_else(|| DEFAULT_REQUESTER.to_string()),
        };

        let note = request.as_notification();
        if !channel.validate(&note) {
            debug!("{} channel rejected recipient {}", action, request.recipient);
            return Err(DispatchError::InvalidRecipient(action));
        }

        let result = channel.send(&note).await;
        let log = AuditEntry::record(&request, &result);
        self.audit.append(&log);

        if result.is_success() {
            info!("Delivered {} to {}", action, request.recipient);
        } else {
            warn!(
                "Delivery of {} to {} failed: {}",
                action, request.recipient, result.detail
            );
        }

        Ok(DispatchReport { result, log })
    }
}

#[async_trait]
impl Relay for Dispatcher {
    async fn relay(&self, payload: SendPayload) -> RelayResponse {
        match self.dispatch(payload).await {
            // Send failures still answer 200 with status "error" in the body.
            Ok(report) => RelayResponse::json(HttpStatus::Ok, &report),
            Err(e) => RelayResponse::error(e.status(), &e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses() {
        assert_eq!(
            DispatchError::RateLimited.status(),
            HttpStatus::TooManyRequests
        );
        assert_eq!(
            DispatchError::MissingFields.status(),
            HttpStatus::BadRequest
        );
        assert_eq!(
            DispatchError::UnknownAction("fax".into()).status(),
            HttpStatus::BadRequest
        );
        assert_eq!(
            DispatchError::InvalidRecipient(Action::Sms).status(),
            HttpStatus::BadRequest
        );
    }

    #[test]
    fn invalid_recipient_names_the_field() {
        assert_eq!(
            DispatchError::InvalidRecipient(Action::Sms).to_string(),
            "invalid phone number or message"
        );
        assert_eq!(
            DispatchError::InvalidRecipient(Action::Email).to_string(),
            "invalid email address or message"
        );
    }
}
