//! Canonical `Transaction` orchestration: state machine + adapter dispatch
//!
//! Every mutating operation opens one `sqlx::Transaction`, locks the target
//! row with `SELECT … FOR UPDATE` for the operation's whole lifetime
//! (including the outbound adapter call — guaranteeing that two concurrent
//! callers cannot advance the same transaction twice), and
//! commits the status change and its accompanying `AuditLog` row together.

use std::sync::Arc;

use chrono::Utc;
use paygate_provider::adapter::AdapterError;
use paygate_provider::ProviderRegistry;
use paygate_store::{AuditLogRepository, TransactionRepository};
use paygate_types::audit::event_type;
use paygate_types::status::TransactionStatus;
use paygate_types::transaction::{InitializeRequest, RefundRequest, TransactionFilters};
use paygate_types::{AuditContext, GatewayError, GatewayResult, Page, PaginationParams, Transaction};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::provider_config::ProviderConfigService;

#[derive(Clone)]
pub struct TransactionService {
    transactions: TransactionRepository,
    audit: AuditLogRepository,
    provider_configs: ProviderConfigService,
    registry: Arc<ProviderRegistry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileError {
    pub transaction_id: Uuid,
    pub error: String,
}

/// Result of the supplemental `reconcile()` sweep: a
/// pull-reconciliation pass over every non-terminal transaction.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileSummary {
    pub total_pending: u64,
    pub reconciled: u64,
    pub errors: Vec<ReconcileError>,
}

impl TransactionService {
    pub fn new(
        transactions: TransactionRepository,
        audit: AuditLogRepository,
        provider_configs: ProviderConfigService,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        TransactionService { transactions, audit, provider_configs, registry }
    }

    /// Creates a PENDING transaction, dispatches it to the merchant's
    /// provider adapter, and advances it to PROCESSING (or FAILED on
    /// adapter exception). An idempotency-key collision at the DB layer
    /// returns the existing record unchanged, without a second dispatch.
    pub async fn initialize(
        &self,
        merchant_id: Uuid,
        req: &InitializeRequest,
        idempotency_key: &str,
        ctx: &AuditContext,
    ) -> GatewayResult<Transaction> {
        if let Some(existing) = self.transactions.find_by_idempotency_key(idempotency_key).await? {
            return Ok(existing);
        }

        let pending = self
            .transactions
            .insert_pending(
                merchant_id,
                idempotency_key,
                &req.provider,
                req.amount.as_decimal(),
                req.currency.as_str(),
                &req.customer,
                req.payment_method.as_deref(),
                &req.metadata,
            )
            .await?;

        if pending.status != TransactionStatus::Pending {
            // A concurrent caller already raced us past PENDING; nothing
            // left to dispatch.
            return Ok(pending);
        }

        self.append_audit(pending.id, event_type::PAYMENT_INITIATED, &json!({"provider": req.provider}), ctx).await?;

        let mut tx = self.transactions.begin().await?;
        let locked = self
            .transactions
            .lock_for_update(&mut tx, pending.id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("transaction {}", pending.id)))?;

        if locked.status != TransactionStatus::Pending {
            tx.commit().await.map_err(storage_err)?;
            return Ok(locked);
        }

        let outcome = self.dispatch_init(merchant_id, req).await;
        match outcome {
            Ok(init) => {
                let updated = self
                    .transactions
                    .apply_transition(&mut tx, pending.id, TransactionStatus::Processing, Some(&init.provider_tx_id), Some(&init.extra), None)
                    .await?;
                self.audit
                    .insert(
                        &mut tx,
                        pending.id,
                        event_type::PAYMENT_PROCESSING,
                        &init.extra,
                        ctx.user_id,
                        ctx.client_ip.as_deref(),
                        ctx.user_agent.as_deref(),
                    )
                    .await?;
                tx.commit().await.map_err(storage_err)?;
                Ok(updated)
            }
            Err(e) => {
                let error_json = json!({"error": e.to_string()});
                self.transactions
                    .apply_transition(&mut tx, pending.id, TransactionStatus::Failed, None, Some(&error_json), None)
                    .await?;
                self.audit
                    .insert(
                        &mut tx,
                        pending.id,
                        event_type::PAYMENT_FAILED,
                        &error_json,
                        ctx.user_id,
                        ctx.client_ip.as_deref(),
                        ctx.user_agent.as_deref(),
                    )
                    .await?;
                tx.commit().await.map_err(storage_err)?;
                Err(e)
            }
        }
    }

    async fn dispatch_init(&self, merchant_id: Uuid, req: &InitializeRequest) -> GatewayResult<paygate_provider::adapter::InitPaymentOutcome> {
        let config = self.provider_configs.load(merchant_id, &req.provider).await?;
        let adapter = self.registry.build(&req.provider, &config).map_err(map_init_error)?;
        adapter
            .init_payment(req.amount, req.currency, &req.customer, &req.metadata)
            .await
            .map_err(map_init_error)
    }

    pub async fn get(&self, id: Uuid) -> GatewayResult<Transaction> {
        self.transactions.find_by_id(id).await?.ok_or_else(|| GatewayError::not_found(format!("transaction {id}")))
    }

    pub async fn list(&self, filters: &TransactionFilters, pagination: PaginationParams) -> GatewayResult<Page<Transaction>> {
        let (items, total) = self.transactions.list(filters, pagination).await?;
        Ok(Page::new(items, pagination, total))
    }

    /// No-op on a terminal transaction.
    /// Otherwise dispatches to the adapter's `verify_payment`, translates
    /// the returned status into the canonical transition, and persists it.
    /// An adapter exception does not change status; it records
    /// `payment.verification_failed` so the next verify or webhook can
    /// recover.
    pub async fn verify(&self, id: Uuid, ctx: &AuditContext) -> GatewayResult<Transaction> {
        let mut tx = self.transactions.begin().await?;
        let current = self
            .transactions
            .lock_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("transaction {id}")))?;

        if current.status.is_terminal() {
            tx.commit().await.map_err(storage_err)?;
            return Ok(current);
        }

        let result = self.dispatch_verify(&current).await;
        match result {
            Ok(verified) => {
                let next_status: TransactionStatus = verified.status.into();
                if next_status == current.status {
                    tx.commit().await.map_err(storage_err)?;
                    return Ok(current);
                }
                if !current.status.can_transition_to(next_status) {
                    tx.rollback().await.map_err(storage_err)?;
                    return Err(GatewayError::InvariantViolation(format!(
                        "illegal transition {} -> {next_status} for transaction {id}",
                        current.status
                    )));
                }
                let completed_at = (next_status == TransactionStatus::Completed).then(Utc::now);
                let updated = self
                    .transactions
                    .apply_transition(&mut tx, id, next_status, None, Some(&verified.extra), completed_at)
                    .await?;
                self.audit
                    .insert(
                        &mut tx,
                        id,
                        event_type_for_status(next_status),
                        &verified.extra,
                        ctx.user_id,
                        ctx.client_ip.as_deref(),
                        ctx.user_agent.as_deref(),
                    )
                    .await?;
                tx.commit().await.map_err(storage_err)?;
                Ok(updated)
            }
            Err(e) => {
                let error_json = json!({"error": e.to_string()});
                self.audit
                    .insert(
                        &mut tx,
                        id,
                        event_type::PAYMENT_VERIFICATION_FAILED,
                        &error_json,
                        ctx.user_id,
                        ctx.client_ip.as_deref(),
                        ctx.user_agent.as_deref(),
                    )
                    .await?;
                tx.commit().await.map_err(storage_err)?;
                Err(e)
            }
        }
    }

    async fn dispatch_verify(&self, current: &Transaction) -> GatewayResult<paygate_provider::adapter::VerifyPaymentOutcome> {
        let provider_tx_id = current
            .provider_transaction_id
            .as_deref()
            .ok_or_else(|| GatewayError::PaymentVerificationError("transaction has no provider reference yet".to_string()))?;
        let config = self.provider_configs.load(current.merchant_id, &current.provider).await?;
        let adapter = self.registry.build(&current.provider, &config).map_err(map_verify_error)?;
        adapter.verify_payment(provider_tx_id).await.map_err(map_verify_error)
    }

    /// Allowed only from COMPLETED; transitions to REFUNDED on adapter
    /// success. Partial refunds update the stored provider response but do
    /// not split the transaction record.
    pub async fn refund(&self, id: Uuid, req: &RefundRequest, ctx: &AuditContext) -> GatewayResult<Transaction> {
        let mut tx = self.transactions.begin().await?;
        let current = self
            .transactions
            .lock_for_update(&mut tx, id)
            .await?
            .ok_or_else(|| GatewayError::not_found(format!("transaction {id}")))?;

        if current.status != TransactionStatus::Completed {
            tx.rollback().await.map_err(storage_err)?;
            return Err(GatewayError::InvariantViolation(format!(
                "refund is only legal from COMPLETED, transaction {id} is {}",
                current.status
            )));
        }

        self.audit
            .insert(
                &mut tx,
                id,
                event_type::REFUND_INITIATED,
                &json!({"amount": req.amount.map(|a| a.to_fixed_string()), "reason": req.reason}),
                ctx.user_id,
                ctx.client_ip.as_deref(),
                ctx.user_agent.as_deref(),
            )
            .await?;

        let provider_tx_id = current.provider_transaction_id.clone().unwrap_or_default();
        let outcome = self.dispatch_refund(&current, req).await;
        match outcome {
            Ok(refund) => {
                let extra = json!({"refund_id": refund.refund_id, "refund": refund.extra});
                let updated = self.transactions.apply_transition(&mut tx, id, TransactionStatus::Refunded, None, Some(&extra), None).await?;
                self.audit
                    .insert(
                        &mut tx,
                        id,
                        event_type::REFUND_COMPLETED,
                        &extra,
                        ctx.user_id,
                        ctx.client_ip.as_deref(),
                        ctx.user_agent.as_deref(),
                    )
                    .await?;
                tx.commit().await.map_err(storage_err)?;
                Ok(updated)
            }
            Err(e) => {
                tx.rollback().await.map_err(storage_err)?;
                let _ = &provider_tx_id; // already embedded in `e` by map_refund_error
                Err(e)
            }
        }
    }

    async fn dispatch_refund(&self, current: &Transaction, req: &RefundRequest) -> GatewayResult<paygate_provider::adapter::RefundOutcome> {
        let provider_tx_id = current.provider_transaction_id.as_deref().unwrap_or_default();
        let config = self.provider_configs.load(current.merchant_id, &current.provider).await?;
        let adapter = self
            .registry
            .build(&current.provider, &config)
            .map_err(|e| map_refund_error(e, &current.provider, provider_tx_id))?;
        adapter
            .refund_payment(provider_tx_id, req.amount, req.reason.as_deref())
            .await
            .map_err(|e| map_refund_error(e, &current.provider, provider_tx_id))
    }

    /// Pull-reconciliation sweep: iterates every
    /// non-terminal transaction calling `verify`, applying each transition
    /// atomically per-transaction. Not an HTTP endpoint; a library
    /// operation an external scheduler may invoke symmetrically with
    /// `retry_due`.
    pub async fn reconcile(&self) -> GatewayResult<ReconcileSummary> {
        let candidates = self.transactions.list_non_terminal().await?;
        let total_pending = candidates.len() as u64;
        let mut reconciled = 0u64;
        let mut errors = Vec::new();

        let ctx = AuditContext::none();
        for candidate in candidates {
            match self.verify(candidate.id, &ctx).await {
                Ok(_) => reconciled += 1,
                Err(e) => errors.push(ReconcileError { transaction_id: candidate.id, error: e.to_string() }),
            }
        }

        Ok(ReconcileSummary { total_pending, reconciled, errors })
    }

    async fn append_audit(&self, transaction_id: Uuid, event_type: &str, event_data: &Value, ctx: &AuditContext) -> GatewayResult<()> {
        let mut tx = self.transactions.begin().await?;
        self.audit
            .insert(&mut tx, transaction_id, event_type, event_data, ctx.user_id, ctx.client_ip.as_deref(), ctx.user_agent.as_deref())
            .await?;
        tx.commit().await.map_err(storage_err)?;
        Ok(())
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

fn map_init_error(e: AdapterError) -> GatewayError {
    match e {
        AdapterError::MissingConfig(msg) => GatewayError::ProviderNotConfigured(msg),
        other => GatewayError::PaymentInitializationError(other.to_string()),
    }
}

fn map_verify_error(e: AdapterError) -> GatewayError {
    match e {
        AdapterError::MissingConfig(msg) => GatewayError::ProviderNotConfigured(msg),
        other => GatewayError::PaymentVerificationError(other.to_string()),
    }
}

fn map_refund_error(e: AdapterError, provider: &str, original_reference: &str) -> GatewayError {
    match e {
        AdapterError::RefundUnsupported => GatewayError::RefundUnsupported {
            provider: provider.to_string(),
            original_reference: original_reference.to_string(),
        },
        AdapterError::MissingConfig(msg) => GatewayError::ProviderNotConfigured(msg),
        other => GatewayError::RefundError(other.to_string()),
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
    fn map_init_error_routes_missing_config_to_provider_not_configured() {
        let mapped = map_init_error(AdapterError::MissingConfig("api_key".to_string()));
        assert!(matches!(mapped, GatewayError::ProviderNotConfigured(msg) if msg == "api_key"));
    }

    #[test]
    fn map_init_error_routes_everything_else_to_initialization_error() {
        let mapped = map_init_error(AdapterError::InitializationFailed("upstream down".to_string()));
        assert!(matches!(mapped, GatewayError::PaymentInitializationError(_)));
    }

    #[test]
    fn map_verify_error_routes_missing_config_to_provider_not_configured() {
        let mapped = map_verify_error(AdapterError::MissingConfig("secret".to_string()));
        assert!(matches!(mapped, GatewayError::ProviderNotConfigured(msg) if msg == "secret"));
    }

    #[test]
    fn map_verify_error_routes_everything_else_to_verification_error() {
        let mapped = map_verify_error(AdapterError::VerificationFailed("timeout".to_string()));
        assert!(matches!(mapped, GatewayError::PaymentVerificationError(_)));
    }

    #[test]
    fn map_refund_error_preserves_provider_and_original_reference_when_unsupported() {
        let mapped = map_refund_error(AdapterError::RefundUnsupported, "bankpay", "sbp-ref-1");
        match mapped {
            GatewayError::RefundUnsupported { provider, original_reference } => {
                assert_eq!(provider, "bankpay");
                assert_eq!(original_reference, "sbp-ref-1");
            }
            other => panic!("expected RefundUnsupported, got {other:?}"),
        }
    }

    #[test]
    fn map_refund_error_routes_missing_config_to_provider_not_configured() {
        let mapped = map_refund_error(AdapterError::MissingConfig("merchant_code".to_string()), "cardgate", "ref-2");
        assert!(matches!(mapped, GatewayError::ProviderNotConfigured(msg) if msg == "merchant_code"));
    }

    #[test]
    fn map_refund_error_routes_everything_else_to_refund_error() {
        let mapped = map_refund_error(AdapterError::RefundFailed("5xx".to_string()), "cpay", "ref-3");
        assert!(matches!(mapped, GatewayError::RefundError(_)));
    }
}
