//! Append-only audit trail. Never mutated after insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub event_type: String,
    pub event_data: Value,
    pub user_id: Option<Uuid>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The request-context columns carried on every `AuditLog` row: the
/// authenticated actor (if any) plus the caller's IP and user agent.
/// Mirrors the original's per-request audit capture, where the client IP
/// and user agent are pulled off the inbound request and the user id off
/// whatever principal, if any, had already been authenticated.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub user_id: Option<Uuid>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    /// No request context available — used by internal sweeps
    /// (`reconcile`, the webhook retry driver) that run off a scheduler
    /// rather than an inbound HTTP call.
    pub fn none() -> Self {
        AuditContext::default()
    }
}

/// Dotted event-type short names emitted by the state machine and webhook
/// pipeline. Kept as `&'static str` constants rather than an enum because
/// new event types are additive and the column is free-text by design.
pub mod event_type {
    pub const PAYMENT_INITIATED: &str = "payment.initiated";
    pub const PAYMENT_PROCESSING: &str = "payment.processing";
    pub const PAYMENT_COMPLETED: &str = "payment.completed";
    pub const PAYMENT_FAILED: &str = "payment.failed";
    pub const PAYMENT_VERIFICATION_FAILED: &str = "payment.verification_failed";
    pub const REFUND_INITIATED: &str = "refund.initiated";
    pub const REFUND_COMPLETED: &str = "refund.completed";
}
