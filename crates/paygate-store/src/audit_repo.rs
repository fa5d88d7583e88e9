//! Append-only audit trail persistence.
//!
//! Every insert here is expected to run inside the same `sqlx::Transaction`
//! as the state change it records, so either both commit or both roll back.

use chrono::Utc;
use paygate_types::{AuditLog, GatewayError, GatewayResult};
use serde_json::Value;
use sqlx::Postgres;
use uuid::Uuid;

use crate::rows::AuditLogRow;

#[derive(Clone, Default)]
pub struct AuditLogRepository;

impl AuditLogRepository {
    pub fn new() -> Self {
        AuditLogRepository
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        transaction_id: Uuid,
        event_type: &str,
        event_data: &Value,
        user_id: Option<Uuid>,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> GatewayResult<AuditLog> {
        let row = sqlx::query_as::<_, AuditLogRow>(
            r#"
            INSERT INTO audit_logs (id, transaction_id, event_type, event_data, user_id, client_ip, user_agent, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, transaction_id, event_type, event_data, user_id, client_ip, user_agent, timestamp
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(transaction_id)
        .bind(event_type)
        .bind(event_data)
        .bind(user_id)
        .bind(client_ip)
        .bind(user_agent)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| GatewayError::Storage(e.to_string()))?;
        Ok(row.into())
    }
}
