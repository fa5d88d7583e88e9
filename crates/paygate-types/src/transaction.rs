//! The canonical `Transaction` entity and the requests that create
//! or query it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::money::{CurrencyCode, Money};
use crate::status::TransactionStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Canonical request body for `POST /payments/initialize`.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeRequest {
    pub provider: String,
    pub amount: Money,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub customer: Customer,
    #[serde(default)]
    pub metadata: Value,
    pub payment_method: Option<String>,
}

/// The canonical payment record. See [`TransactionStatus`] for the
/// legal-transition table governing its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    /// The merchant this transaction belongs to. Required to resolve a
    /// merchant's provider configuration on every operation that touches an
    /// adapter (`verify`, `refund`); not part of the public response shape
    /// any endpoint promises, so it's excluded from serialization (see
    /// DESIGN.md).
    #[serde(skip_serializing)]
    pub merchant_id: Uuid,
    pub idempotency_key: String,
    pub provider: String,
    pub provider_transaction_id: Option<String>,
    pub provider_response: Value,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub status: TransactionStatus,
    pub customer: Customer,
    pub payment_method: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Filters accepted by `GET /payments`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionFilters {
    pub provider: Option<String>,
    pub status: Option<TransactionStatus>,
    pub customer_id: Option<String>,
}

/// Body for `POST /payments/{id}/refund`, exercised through the core
/// `refund` operation.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RefundRequest {
    pub amount: Option<Money>,
    pub reason: Option<String>,
}
