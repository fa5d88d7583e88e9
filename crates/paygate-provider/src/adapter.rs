//! The provider-adapter capability contract.
//!
//! Every upstream — async push, OTP-confirm, redirect-card, OAuth-gated push
//! — normalises to this one interface. `status` in every return uses the
//! internal vocabulary [`CanonicalStatus`]; each adapter owns a private
//! status-code map from its upstream's codes to this vocabulary, defaulting
//! unknown codes to `Pending`.

use async_trait::async_trait;
use paygate_types::money::{CurrencyCode, Money};
use paygate_types::status::CanonicalStatus;
use paygate_types::transaction::Customer;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("missing required config field: {0}")]
    MissingConfig(String),
    #[error("payment initialization error: {0}")]
    InitializationFailed(String),
    #[error("payment verification error: {0}")]
    VerificationFailed(String),
    #[error("refund is not supported by this provider")]
    RefundUnsupported,
    #[error("refund error: {0}")]
    RefundFailed(String),
    #[error("webhook payload is structurally invalid: {0}")]
    InvalidWebhookPayload(String),
}

#[derive(Debug, Clone)]
pub struct InitPaymentOutcome {
    pub provider_tx_id: String,
    pub status: CanonicalStatus,
    pub payment_url: Option<String>,
    pub extra: Value,
}

#[derive(Debug, Clone)]
pub struct VerifyPaymentOutcome {
    pub status: CanonicalStatus,
    pub amount: Option<Money>,
    pub currency: Option<CurrencyCode>,
    pub extra: Value,
}

#[derive(Debug, Clone)]
pub struct RefundOutcome {
    pub refund_id: String,
    pub status: CanonicalStatus,
    pub amount: Money,
    pub currency: CurrencyCode,
    pub extra: Value,
}

#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub provider_tx_id: String,
    pub event_type: String,
    pub status: CanonicalStatus,
    pub extra: Value,
}

/// The normalised capability set every provider adapter implements.
///
/// Construction (outside this trait, in each adapter's `TryFrom<&Value>` or
/// equivalent) takes an opaque config map from the decrypted provider
/// config; required keys missing must fail fast. All HTTP calls carry a
/// 15-30s timeout; network errors surface as `InitializationFailed` /
/// `VerificationFailed`.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider short name this adapter instance was built for, e.g.
    /// `"standard_bank_pay"`.
    fn short_name(&self) -> &str;

    async fn init_payment(
        &self,
        amount: Money,
        currency: CurrencyCode,
        customer: &Customer,
        metadata: &Value,
    ) -> Result<InitPaymentOutcome, AdapterError>;

    async fn verify_payment(&self, provider_tx_id: &str) -> Result<VerifyPaymentOutcome, AdapterError>;

    async fn refund_payment(
        &self,
        provider_tx_id: &str,
        amount: Option<Money>,
        reason: Option<&str>,
    ) -> Result<RefundOutcome, AdapterError>;

    /// Verifies an inbound webhook's signature against its raw body bytes.
    /// Providers whose protocol carries no signature return `true`
    /// unconditionally — an explicit unsigned-accept policy.
    fn verify_webhook_signature(&self, raw_bytes: &[u8], signature: Option<&str>) -> bool;

    async fn handle_webhook(&self, payload: &Value) -> Result<WebhookOutcome, AdapterError>;
}
