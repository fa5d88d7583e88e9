//! Raw row shapes returned by `sqlx` and their conversions into the
//! storage-agnostic domain types from `paygate-types`.
//!
//! Only `Transaction` needs a non-trivial conversion: its `amount`,
//! `currency`, and `status` fields are validated newtypes in
//! `paygate-types` that don't implement `sqlx::Decode` themselves, so the row
//! carries the raw column types and converts on the way out.

use chrono::{DateTime, Utc};
use paygate_types::money::{CurrencyCode, Money};
use paygate_types::status::TransactionStatus;
use paygate_types::transaction::Customer;
use paygate_types::{AuditLog, Merchant, Provider, ProviderConfig, Transaction, WebhookEvent};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct MerchantRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub business_name: String,
    pub business_category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MerchantRow> for Merchant {
    fn from(r: MerchantRow) -> Self {
        Merchant {
            id: r.id,
            name: r.name,
            email: r.email,
            phone: r.phone,
            business_name: r.business_name,
            business_category: r.business_category,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub username: String,
    pub password_digest: String,
    pub api_key_hash: String,
    pub created_at: DateTime<Utc>,
}

impl From<AccountRow> for paygate_types::Account {
    fn from(r: AccountRow) -> Self {
        paygate_types::Account {
            id: r.id,
            merchant_id: r.merchant_id,
            username: r.username,
            password_digest: r.password_digest,
            api_key_hash: r.api_key_hash,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProviderRow {
    pub id: Uuid,
    pub short_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProviderRow> for Provider {
    fn from(r: ProviderRow) -> Self {
        Provider {
            id: r.id,
            short_name: r.short_name,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ProviderConfigRow {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub provider_id: Uuid,
    pub provider_short_name: String,
    pub is_active: bool,
    pub config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProviderConfigRow> for ProviderConfig {
    fn from(r: ProviderConfigRow) -> Self {
        ProviderConfig {
            id: r.id,
            merchant_id: r.merchant_id,
            provider_id: r.provider_id,
            provider_short_name: r.provider_short_name,
            is_active: r.is_active,
            config: r.config,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub idempotency_key: String,
    pub provider: String,
    pub provider_transaction_id: Option<String>,
    pub provider_response: Value,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub customer_id: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub payment_method: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
#[error("corrupt transaction row: {0}")]
pub struct RowConversionError(String);

impl TryFrom<TransactionRow> for Transaction {
    type Error = RowConversionError;

    fn try_from(r: TransactionRow) -> Result<Self, Self::Error> {
        let currency = CurrencyCode::parse(&r.currency).map_err(|e| RowConversionError(e.to_string()))?;
        let status = TransactionStatus::from_str(&r.status).map_err(|e| RowConversionError(e.to_string()))?;
        Ok(Transaction {
            id: r.id,
            merchant_id: r.merchant_id,
            idempotency_key: r.idempotency_key,
            provider: r.provider,
            provider_transaction_id: r.provider_transaction_id,
            provider_response: r.provider_response,
            amount: Money::from_decimal_unchecked(r.amount),
            currency,
            status,
            customer: Customer {
                id: r.customer_id,
                phone: r.customer_phone,
                email: r.customer_email,
                name: r.customer_name,
            },
            payment_method: r.payment_method,
            metadata: r.metadata,
            created_at: r.created_at,
            updated_at: r.updated_at,
            completed_at: r.completed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AuditLogRow {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub event_type: String,
    pub event_data: Value,
    pub user_id: Option<Uuid>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<AuditLogRow> for AuditLog {
    fn from(r: AuditLogRow) -> Self {
        AuditLog {
            id: r.id,
            transaction_id: r.transaction_id,
            event_type: r.event_type,
            event_data: r.event_data,
            user_id: r.user_id,
            client_ip: r.client_ip,
            user_agent: r.user_agent,
            timestamp: r.timestamp,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct WebhookEventRow {
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

impl From<WebhookEventRow> for WebhookEvent {
    fn from(r: WebhookEventRow) -> Self {
        WebhookEvent {
            id: r.id,
            transaction_id: r.transaction_id,
            provider: r.provider,
            event_type: r.event_type,
            payload: r.payload,
            signature_header: r.signature_header,
            verified: r.verified,
            processed: r.processed,
            retry_count: r.retry_count,
            error_message: r.error_message,
            created_at: r.created_at,
            processed_at: r.processed_at,
        }
    }
}
