//! Canonical `Transaction` persistence.
//!
//! State-transition *policy* (the legal-transitions table) lives in
//! `paygate-core`; this repository only provides the primitives the core
//! needs to enforce it safely under concurrency: row-level locking via
//! `SELECT … FOR UPDATE` inside an explicit `sqlx::Transaction`, and an
//! idempotency-key-aware insert that returns the pre-existing row on
//! collision instead of erroring.

use chrono::{DateTime, Utc};
use paygate_types::status::TransactionStatus;
use paygate_types::transaction::{Customer, TransactionFilters};
use paygate_types::{GatewayError, GatewayResult, PaginationParams, Transaction};
use serde_json::Value;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::rows::TransactionRow;

const TRANSACTION_COLUMNS: &str = r#"
    id, merchant_id, idempotency_key, provider, provider_transaction_id, provider_response,
    amount, currency, status, customer_id, customer_phone, customer_email, customer_name,
    payment_method, metadata, created_at, updated_at, completed_at
"#;

#[derive(Clone)]
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        TransactionRepository { pool }
    }

    pub async fn begin(&self) -> GatewayResult<sqlx::Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(storage_err)
    }

    /// Inserts a new PENDING transaction. On an `idempotency_key` collision
    /// (a retried client request), returns the pre-existing row unchanged
    /// rather than erroring — the durable uniqueness constraint is the
    /// authoritative backstop behind the best-effort idempotency cache.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_pending(
        &self,
        merchant_id: Uuid,
        idempotency_key: &str,
        provider: &str,
        amount: rust_decimal::Decimal,
        currency: &str,
        customer: &Customer,
        payment_method: Option<&str>,
        metadata: &Value,
    ) -> GatewayResult<Transaction> {
        if let Some(existing) = self.find_by_idempotency_key(idempotency_key).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let query = format!(
            r#"
            INSERT INTO transactions (
                id, merchant_id, idempotency_key, provider, provider_transaction_id, provider_response,
                amount, currency, status, customer_id, customer_phone, customer_email, customer_name,
                payment_method, metadata, created_at, updated_at, completed_at
            )
            VALUES ($1, $2, $3, $4, NULL, '{{}}', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14, NULL)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(id)
            .bind(merchant_id)
            .bind(idempotency_key)
            .bind(provider)
            .bind(amount)
            .bind(currency)
            .bind(TransactionStatus::Pending.to_string())
            .bind(&customer.id)
            .bind(&customer.phone)
            .bind(&customer.email)
            .bind(&customer.name)
            .bind(payment_method)
            .bind(metadata)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        match row {
            Some(row) => row_into_transaction(row),
            None => self
                .find_by_idempotency_key(idempotency_key)
                .await?
                .ok_or_else(|| GatewayError::Storage("idempotency conflict but no existing row found".into())),
        }
    }

    pub async fn find_by_idempotency_key(&self, idempotency_key: &str) -> GatewayResult<Option<Transaction>> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE idempotency_key = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(idempotency_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(row_into_transaction).transpose()
    }

    pub async fn find_by_id(&self, id: Uuid) -> GatewayResult<Option<Transaction>> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1");
        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(row_into_transaction).transpose()
    }

    pub async fn find_by_provider_transaction_id(&self, provider: &str, provider_transaction_id: &str) -> GatewayResult<Option<Transaction>> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE provider = $1 AND provider_transaction_id = $2");
        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(provider)
            .bind(provider_transaction_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(row_into_transaction).transpose()
    }

    /// Locks the row for the remainder of `tx` via `SELECT … FOR UPDATE`,
    /// guaranteeing two concurrent callers (e.g. a webhook and a manual
    /// verify) cannot both observe and advance the same transaction twice.
    pub async fn lock_for_update(&self, tx: &mut sqlx::Transaction<'_, Postgres>, id: Uuid) -> GatewayResult<Option<Transaction>> {
        let query = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(storage_err)?;
        row.map(row_into_transaction).transpose()
    }

    /// Persists a status transition (and any accompanying provider
    /// reference/response update) within the caller's already-open,
    /// already-locked transaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn apply_transition(
        &self,
        tx: &mut sqlx::Transaction<'_, Postgres>,
        id: Uuid,
        status: TransactionStatus,
        provider_transaction_id: Option<&str>,
        provider_response: Option<&Value>,
        completed_at: Option<DateTime<Utc>>,
    ) -> GatewayResult<Transaction> {
        let query = format!(
            r#"
            UPDATE transactions
            SET status = $2,
                provider_transaction_id = COALESCE($3, provider_transaction_id),
                provider_response = COALESCE($4, provider_response),
                completed_at = COALESCE($5, completed_at),
                updated_at = $6
            WHERE id = $1
            RETURNING {TRANSACTION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(id)
            .bind(status.to_string())
            .bind(provider_transaction_id)
            .bind(provider_response)
            .bind(completed_at)
            .bind(Utc::now())
            .fetch_one(&mut **tx)
            .await
            .map_err(storage_err)?;
        row_into_transaction(row)
    }

    pub async fn list(&self, filters: &TransactionFilters, pagination: PaginationParams) -> GatewayResult<(Vec<Transaction>, u64)> {
        let status_filter = filters.status.map(|s| s.to_string());

        let query = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS} FROM transactions
            WHERE ($1::text IS NULL OR provider = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR customer_id = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(&filters.provider)
            .bind(&status_filter)
            .bind(&filters.customer_id)
            .bind(pagination.limit())
            .bind(pagination.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        let count_query = r#"
            SELECT COUNT(*) FROM transactions
            WHERE ($1::text IS NULL OR provider = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::text IS NULL OR customer_id = $3)
        "#;
        let total: i64 = sqlx::query_scalar(count_query)
            .bind(&filters.provider)
            .bind(&status_filter)
            .bind(&filters.customer_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let transactions: GatewayResult<Vec<Transaction>> = rows.into_iter().map(row_into_transaction).collect();
        Ok((transactions?, total.max(0) as u64))
    }

    /// Every transaction still in a non-terminal status, for the
    /// supplemental `reconcile()` sweep.
    pub async fn list_non_terminal(&self) -> GatewayResult<Vec<Transaction>> {
        let query = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE status IN ($1, $2) ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, TransactionRow>(&query)
            .bind(TransactionStatus::Pending.to_string())
            .bind(TransactionStatus::Processing.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(row_into_transaction).collect()
    }
}

fn row_into_transaction(row: TransactionRow) -> GatewayResult<Transaction> {
    Transaction::try_from(row).map_err(|e| GatewayError::Storage(e.to_string()))
}

fn storage_err(e: sqlx::Error) -> GatewayError {
    GatewayError::Storage(e.to_string())
}
