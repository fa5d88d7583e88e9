//! Canonical data model and error taxonomy for the payment gateway
//! aggregator.
//!
//! This crate is deliberately storage- and transport-agnostic: it defines
//! the canonical entity shapes (`Transaction`, `AuditLog`, `WebhookEvent`,
//! `Merchant`, `Account`, `Provider`, `ProviderConfig`), the canonical status
//! vocabulary and its legal-transition table, the fixed-point `Money` type,
//! and the gateway's error taxonomy. Provider adapters, the store, and the
//! core services all depend on this crate; it depends on none of them.

pub mod audit;
pub mod error;
pub mod idempotency;
pub mod merchant;
pub mod money;
pub mod pagination;
pub mod provider;
pub mod status;
pub mod transaction;
pub mod webhook;

pub use audit::{AuditContext, AuditLog};
pub use error::{GatewayError, GatewayResult};
pub use idempotency::IdempotencyRecord;
pub use merchant::{Account, Merchant, SealedApiKey, SignupRequest};
pub use money::{CurrencyCode, Money, MoneyError};
pub use pagination::{Page, PaginationParams};
pub use provider::{Provider, ProviderConfig};
pub use status::{CanonicalStatus, TransactionStatus};
pub use transaction::{Customer, InitializeRequest, RefundRequest, Transaction, TransactionFilters};
pub use webhook::WebhookEvent;
