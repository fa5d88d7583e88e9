//! Webhook ingestion and reliable-processing pipeline.
//!
//! `process` always returns 200 to the provider regardless of internal
//! outcome — that mapping happens at the HTTP facade, not here; this module
//! only ever reports success/failure of the processing attempt itself, so
//! the facade can decide how to respond without knowing the pipeline's
//! internals.

use std::sync::Arc;

use chrono::Utc;
use paygate_provider::adapter::AdapterError;
use paygate_provider::ProviderRegistry;
use paygate_store::{AuditLogRepository, TransactionRepository, WebhookEventRepository};
use paygate_types::audit::event_type;
use paygate_types::status::TransactionStatus;
use paygate_types::{AuditContext, GatewayError, GatewayResult, WebhookEvent};
use serde_json::Value;
use uuid::Uuid;

use crate::provider_config::ProviderConfigService;

#[derive(Clone)]
pub struct WebhookService {
    webhooks: WebhookEventRepository,
    transactions: TransactionRepository,
    audit: AuditLogRepository,
    provider_configs: ProviderConfigService,
    registry: Arc<ProviderRegistry>,
}

impl WebhookService {
    pub fn new(
        webhooks: WebhookEventRepository,
        transactions: TransactionRepository,
        audit: AuditLogRepository,
        provider_configs: ProviderConfigService,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        WebhookService { webhooks, transactions, audit, provider_configs, registry }
    }

    /// Persists an inbound event in `verified=false, processed=false,
    /// retry_count=0`. When `signature` and `raw_bytes` are both present,
    /// delegates to the adapter's `verify_webhook_signature`; when either
    /// is absent, `verified=true` — an explicit unsigned-accept policy for
    /// providers whose protocol carries no signature.
    pub async fn receive(&self, provider: &str, payload: &Value, signature: Option<&str>, raw_bytes: Option<&[u8]>) -> GatewayResult<Uuid> {
        let verified = match (raw_bytes, signature) {
            (Some(raw), sig) => self.adapter_for(provider).await.map(|a| a.verify_webhook_signature(raw, sig)).unwrap_or(false),
            (None, _) => true,
        };

        let event = self.webhooks.insert(provider, payload, signature, verified).await?;
        Ok(event.id)
    }

    /// Idempotent: a re-`process` of an already-processed event returns
    /// success with no side effect. An unverified event is a retry cause,
    /// not a hard failure. Otherwise dispatches to the adapter's
    /// `handle_webhook`, resolves the owning `Transaction` by
    /// `provider_transaction_id`, applies the derived status through the
    /// same transition guards as `verify`, links the event, and marks it
    /// processed.
    pub async fn process(&self, event_id: Uuid, ctx: &AuditContext) -> GatewayResult<bool> {
        let event = self.webhooks.find_by_id(event_id).await?.ok_or_else(|| GatewayError::not_found(format!("webhook event {event_id}")))?;

        if event.processed {
            return Ok(true);
        }

        if !event.verified {
            self.webhooks.record_failure(event_id, "Webhook signature not verified").await?;
            return Ok(false);
        }

        match self.apply(&event, ctx).await {
            Ok(()) => Ok(true),
            Err(e) => {
                self.webhooks.record_failure(event_id, &e.to_string()).await?;
                Ok(false)
            }
        }
    }

    async fn apply(&self, event: &WebhookEvent, ctx: &AuditContext) -> GatewayResult<()> {
        let adapter = self.adapter_for(&event.provider).await?;
        let outcome = adapter
            .handle_webhook(&event.payload)
            .await
            .map_err(|e| GatewayError::WebhookVerificationError(e.to_string()))?;

        let transaction = self
            .transactions
            .find_by_provider_transaction_id(&event.provider, &outcome.provider_tx_id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("transaction for provider reference {}", outcome.provider_tx_id)))?;

        let next_status: TransactionStatus = outcome.status.into();

        let mut tx = self.transactions.begin().await?;
        let locked = self
            .transactions
            .lock_for_update(&mut tx, transaction.id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("transaction {}", transaction.id)))?;

        if locked.status != next_status {
            if !locked.status.can_transition_to(next_status) {
                tx.rollback().await.map_err(storage_err)?;
                return Err(GatewayError::InvariantViolation(format!(
                    "illegal transition {} -> {next_status} for transaction {}",
                    locked.status, transaction.id
                )));
            }
            let completed_at = (next_status == TransactionStatus::Completed).then(Utc::now);
            self.transactions
                .apply_transition(&mut tx, transaction.id, next_status, None, Some(&outcome.extra), completed_at)
                .await?;
            self.audit
                .insert(
                    &mut tx,
                    transaction.id,
                    event_type_for_status(next_status),
                    &outcome.extra,
                    ctx.user_id,
                    ctx.client_ip.as_deref(),
                    ctx.user_agent.as_deref(),
                )
                .await?;
        }

        tx.commit().await.map_err(storage_err)?;

        self.webhooks.mark_processed(event.id, transaction.id, &outcome.event_type).await?;
        Ok(())
    }

    async fn adapter_for(&self, provider: &str) -> GatewayResult<Arc<dyn paygate_provider::adapter::ProviderAdapter>> {
        let config = self.provider_configs.load_any(provider).await?;
        self.registry.build(provider, &config).map_err(map_webhook_error)
    }

    /// Scans events where `processed=false ∧ retry_count < MAX_RETRY`, and
    /// for each whose backoff window has
    /// elapsed since `created_at`, invokes `process`. Returns the count of
    /// successful processings. Invoked by an external scheduler on its own
    /// timer — this pipeline owns no clock of its own.
    pub async fn retry_due(&self, now: chrono::DateTime<Utc>) -> GatewayResult<u64> {
        let candidates = self.webhooks.find_retry_candidates().await?;
        let mut processed_count = 0u64;
        let ctx = AuditContext::none();

        for candidate in candidates {
            if !candidate.is_retry_eligible(now) {
                continue;
            }
            if self.process(candidate.id, &ctx).await? {
                processed_count += 1;
            }
        }

        Ok(processed_count)
    }

    /// Events that exceeded the retry budget: no longer auto-retried, still
    /// queryable and manually replayable via `process`.
    pub async fn dead_letter_queue(&self) -> GatewayResult<Vec<WebhookEvent>> {
        self.webhooks.find_dead_lettered().await
    }
}

fn event_type_for_status(status: TransactionStatus) -> &'static str {
    match status {
        TransactionStatus::Processing => event_type::PAYMENT_PROCESSING,
        TransactionStatus::Completed => event_type::PAYMENT_COMPLETED,
        TransactionStatus::Failed => event_type::PAYMENT_FAILED,
        TransactionStatus::Refunded => event_type::REFUND_COMPLETED,
        TransactionStatus::Pending => event_type::PAYMENT_INITIATED,
    }
}

fn map_webhook_error(e: AdapterError) -> GatewayError {
    match e {
        AdapterError::MissingConfig(msg) => GatewayError::ProviderNotConfigured(msg),
        other => GatewayError::WebhookVerificationError(other.to_string()),
    }
}

fn storage_err(e: sqlx::Error) -> GatewayError {
    GatewayError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_for_status_covers_every_non_terminal_and_terminal_variant() {
        assert_eq!(event_type_for_status(TransactionStatus::Pending), event_type::PAYMENT_INITIATED);
        assert_eq!(event_type_for_status(TransactionStatus::Processing), event_type::PAYMENT_PROCESSING);
        assert_eq!(event_type_for_status(TransactionStatus::Completed), event_type::PAYMENT_COMPLETED);
        assert_eq!(event_type_for_status(TransactionStatus::Failed), event_type::PAYMENT_FAILED);
        assert_eq!(event_type_for_status(TransactionStatus::Refunded), event_type::REFUND_COMPLETED);
    }

    #[test]
    fn map_webhook_error_routes_missing_config_to_provider_not_configured() {
        let mapped = map_webhook_error(AdapterError::MissingConfig("shared_secret".to_string()));
        assert!(matches!(mapped, GatewayError::ProviderNotConfigured(msg) if msg == "shared_secret"));
    }

    #[test]
    fn map_webhook_error_routes_everything_else_to_webhook_verification_error() {
        let mapped = map_webhook_error(AdapterError::InvalidWebhookPayload("missing reference".to_string()));
        assert!(matches!(mapped, GatewayError::WebhookVerificationError(_)));
    }
}
