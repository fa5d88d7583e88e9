//! Inbound webhook event persistence and the retry/dead-letter query surface.

use chrono::Utc;
use paygate_types::webhook::MAX_RETRY;
use paygate_types::{GatewayError, GatewayResult, WebhookEvent};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::rows::WebhookEventRow;

const WEBHOOK_COLUMNS: &str = r#"
    id, transaction_id, provider, event_type, payload, signature_header,
    verified, processed, retry_count, error_message, created_at, processed_at
"#;

#[derive(Clone)]
pub struct WebhookEventRepository {
    pool: PgPool,
}

impl WebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        WebhookEventRepository { pool }
    }

    /// Persists a freshly received event in `verified=false, processed=false,
    /// retry_count=0`; the caller sets `verified` based on signature
    /// verification outcome.
    pub async fn insert(&self, provider: &str, payload: &Value, signature_header: Option<&str>, verified: bool) -> GatewayResult<WebhookEvent> {
        let query = format!(
            r#"
            INSERT INTO webhook_events (
                id, transaction_id, provider, event_type, payload, signature_header,
                verified, processed, retry_count, error_message, created_at, processed_at
            )
            VALUES ($1, NULL, $2, NULL, $3, $4, $5, FALSE, 0, NULL, $6, NULL)
            RETURNING {WEBHOOK_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, WebhookEventRow>(&query)
            .bind(Uuid::new_v4())
            .bind(provider)
            .bind(payload)
            .bind(signature_header)
            .bind(verified)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.into())
    }

    pub async fn find_by_id(&self, id: Uuid) -> GatewayResult<Option<WebhookEvent>> {
        let query = format!("SELECT {WEBHOOK_COLUMNS} FROM webhook_events WHERE id = $1");
        let row = sqlx::query_as::<_, WebhookEventRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(Into::into))
    }

    /// Links the event to the transaction it resolved and marks it
    /// processed, in one statement.
    pub async fn mark_processed(&self, id: Uuid, transaction_id: Uuid, event_type: &str) -> GatewayResult<WebhookEvent> {
        let query = format!(
            r#"
            UPDATE webhook_events
            SET transaction_id = $2, event_type = $3, processed = TRUE, processed_at = $4, error_message = NULL
            WHERE id = $1
            RETURNING {WEBHOOK_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, WebhookEventRow>(&query)
            .bind(id)
            .bind(transaction_id)
            .bind(event_type)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.into())
    }

    /// Records a failed processing attempt: increments `retry_count` and
    /// sets `error_message`.
    pub async fn record_failure(&self, id: Uuid, error_message: &str) -> GatewayResult<WebhookEvent> {
        let query = format!(
            r#"
            UPDATE webhook_events
            SET retry_count = retry_count + 1, error_message = $2
            WHERE id = $1
            RETURNING {WEBHOOK_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, WebhookEventRow>(&query)
            .bind(id)
            .bind(error_message)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.into())
    }

    /// Every event not yet processed and still under the retry budget. The
    /// caller (`paygate-core`'s `retry_due`) further filters these by
    /// `WebhookEvent::is_retry_eligible` to respect the backoff schedule.
    pub async fn find_retry_candidates(&self) -> GatewayResult<Vec<WebhookEvent>> {
        let query = format!("SELECT {WEBHOOK_COLUMNS} FROM webhook_events WHERE processed = FALSE AND retry_count < $1 ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, WebhookEventRow>(&query)
            .bind(MAX_RETRY)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Events that have exhausted the retry budget: no longer auto-retried,
    /// still queryable and manually replayable.
    pub async fn find_dead_lettered(&self) -> GatewayResult<Vec<WebhookEvent>> {
        let query = format!("SELECT {WEBHOOK_COLUMNS} FROM webhook_events WHERE processed = FALSE AND retry_count >= $1 ORDER BY created_at ASC");
        let rows = sqlx::query_as::<_, WebhookEventRow>(&query)
            .bind(MAX_RETRY)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

fn storage_err(e: sqlx::Error) -> GatewayError {
    GatewayError::Storage(e.to_string())
}
