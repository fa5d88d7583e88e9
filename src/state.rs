//! Shared application state: the wired-up provider config, idempotency,
//! transaction, webhook, and merchant services plus the process-wide
//! provider registry, handed to every Axum handler via
//! [`axum::extract::State`].

use std::sync::Arc;

use paygate_core::{IdempotencyCache, MerchantService, TransactionService, WebhookService};
use paygate_provider::ProviderRegistry;
use paygate_store::{AuditLogRepository, MerchantRepository, ProviderRepository, TransactionRepository, WebhookEventRepository};
use sqlx::PgPool;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub transactions: TransactionService,
    pub webhooks: WebhookService,
    pub merchants: MerchantService,
    pub idempotency: Arc<IdempotencyCache>,
    pub idempotency_ttl_seconds: u64,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let mut registry = ProviderRegistry::new();
        paygate_provider_bankpay::register(&mut registry);
        paygate_provider_cpay::register(&mut registry);
        paygate_provider_cardgate::register(&mut registry);
        paygate_provider_mpesa::register(&mut registry);
        let registry = Arc::new(registry);

        let transaction_repo = TransactionRepository::new(pool.clone());
        let audit_repo = AuditLogRepository::new();
        let provider_repo = ProviderRepository::new(pool.clone());
        let webhook_repo = WebhookEventRepository::new(pool.clone());
        let merchant_repo = MerchantRepository::new(pool);

        let provider_configs = paygate_core::ProviderConfigService::new(provider_repo);

        let transactions = TransactionService::new(transaction_repo.clone(), audit_repo.clone(), provider_configs.clone(), registry.clone());
        let webhooks = WebhookService::new(webhook_repo, transaction_repo, audit_repo, provider_configs, registry);
        let merchants = MerchantService::new(merchant_repo, config.api_key_prefix.clone());

        AppState {
            transactions,
            webhooks,
            merchants,
            idempotency: Arc::new(IdempotencyCache::new()),
            idempotency_ttl_seconds: config.idempotency_ttl_seconds,
        }
    }
}
