use notify_core::AuditEntry;
use tracing::{error, info};

/// Destination for audit entries. Entries are write-once; sinks only append.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: &AuditEntry);
}

/// Writes each entry as one INFO line on the `audit` target, which the logging
/// setup routes into the daily log file.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn append(&self, entry: &AuditEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => info!(target: "audit", "notification: {}", json),
            Err(e) => error!(target: "audit", "could not serialize audit entry: {}", e),
        }
    }
}

