//! Received upstream notification record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The fixed retry budget and backoff schedule for the webhook pipeline.
/// Beyond the table's length, the last entry is reused.
pub const MAX_RETRY: i32 = 5;
pub const RETRY_SCHEDULE_SECONDS: [i64; 5] = [60, 300, 900, 3_600, 21_600];

pub fn retry_delay_seconds(retry_count: i32) -> i64 {
    let idx = retry_count.max(0) as usize;
    let last = RETRY_SCHEDULE_SECONDS.len() - 1;
    RETRY_SCHEDULE_SECONDS[idx.min(last)]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub provider: String,
    pub event_type: Option<String>,
    pub payload: Value,
    pub signature_header: Option<String>,
    pub verified: bool,
    pub processed: bool,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl WebhookEvent {
    /// `processed=false ∧ retry_count>=MAX_RETRY` — no longer auto-retried,
    /// queryable and manually replayable.
    pub fn is_dead_lettered(&self) -> bool {
        !self.processed && self.retry_count >= MAX_RETRY
    }

    /// Whether this event is eligible for another `retry_due` sweep pass at
    /// `now`: not yet processed, under budget, and past its backoff window
    /// measured from `created_at`.
    pub fn is_retry_eligible(&self, now: DateTime<Utc>) -> bool {
        if self.processed || self.retry_count >= MAX_RETRY {
            return false;
        }
        let delay = retry_delay_seconds(self.retry_count);
        now >= self.created_at + chrono::Duration::seconds(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_reuses_last_entry_past_table() {
        assert_eq!(retry_delay_seconds(0), 60);
        assert_eq!(retry_delay_seconds(4), 21_600);
        assert_eq!(retry_delay_seconds(10), 21_600);
    }

    fn event_at(retry_count: i32, processed: bool, created_at: DateTime<Utc>) -> WebhookEvent {
        WebhookEvent {
            id: Uuid::new_v4(),
            transaction_id: None,
            provider: "cpay".to_string(),
            event_type: None,
            payload: serde_json::json!({}),
            signature_header: None,
            verified: false,
            processed,
            retry_count,
            error_message: None,
            created_at,
            processed_at: None,
        }
    }

    #[test]
    fn below_max_retry_is_eligible_once_backoff_elapses() {
        let now = Utc::now();
        let event = event_at(MAX_RETRY - 1, false, now - chrono::Duration::seconds(21_600));
        assert!(event.is_retry_eligible(now));
        assert!(!event.is_dead_lettered());
    }

    #[test]
    fn at_max_retry_is_skipped_by_the_scheduler() {
        let now = Utc::now();
        let event = event_at(MAX_RETRY, false, now - chrono::Duration::seconds(100_000));
        assert!(!event.is_retry_eligible(now));
        assert!(event.is_dead_lettered());
    }

    #[test]
    fn not_yet_due_is_not_eligible() {
        let now = Utc::now();
        let event = event_at(0, false, now);
        assert!(!event.is_retry_eligible(now));
    }

    #[test]
    fn processed_event_is_never_eligible() {
        let now = Utc::now();
        let event = event_at(0, true, now - chrono::Duration::seconds(1000));
        assert!(!event.is_retry_eligible(now));
    }
}
