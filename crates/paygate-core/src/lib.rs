//! Orchestration layer: idempotency, provider-config decryption, the
//! transaction state machine, the webhook pipeline, and merchant auth.
//!
//! Everything here is storage- and transport-agnostic: it depends on
//! `paygate-store` for persistence and `paygate-provider` for the adapter
//! contract, but knows nothing about HTTP. The root binary wires these
//! services to an Axum router and owns the one process-wide
//! `ProviderRegistry`.

pub mod idempotency;
pub mod merchant_service;
pub mod provider_config;
pub mod transaction_service;
pub mod webhook_service;

pub use idempotency::IdempotencyCache;
pub use merchant_service::MerchantService;
pub use provider_config::ProviderConfigService;
pub use transaction_service::{ReconcileError, ReconcileSummary, TransactionService};
pub use webhook_service::WebhookService;
