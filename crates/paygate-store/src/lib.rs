//! Postgres persistence for the payment gateway aggregator.
//!
//! One repository per entity family, each a thin `sqlx`-backed wrapper that
//! converts between raw rows ([`rows`]) and the storage-agnostic types in
//! `paygate-types`. `paygate-core` is the only consumer; nothing here knows
//! about HTTP or the adapter registry.

pub mod audit_repo;
pub mod merchant_repo;
pub mod pool;
pub mod provider_repo;
pub mod rows;
pub mod transaction_repo;
pub mod webhook_repo;

pub use audit_repo::AuditLogRepository;
pub use merchant_repo::MerchantRepository;
pub use pool::{connect, run_migrations};
pub use provider_repo::ProviderRepository;
pub use transaction_repo::TransactionRepository;
pub use webhook_repo::WebhookEventRepository;
