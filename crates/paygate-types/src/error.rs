//! Error taxonomy shared by every component of the gateway.
//!
//! Lower-level components (adapters, the store, the core services) raise
//! these typed errors. The HTTP facade is the sole place that maps them to
//! status codes; nothing below it should know about HTTP.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed request. Recovered locally.
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing or invalid API key.
    #[error("unauthorized")]
    Unauthorized,

    /// Unknown transaction, provider, or merchant.
    #[error("not found: {0}")]
    NotFound(String),

    /// Merchant has no active configuration for the requested provider.
    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// The upstream provider rejected or could not be reached during
    /// initiation.
    #[error("payment initialization error: {0}")]
    PaymentInitializationError(String),

    /// The upstream provider rejected or could not be reached during
    /// verification.
    #[error("payment verification error: {0}")]
    PaymentVerificationError(String),

    /// The adapter does not support refunds at all.
    #[error("refund unsupported by provider {provider}: {original_reference}")]
    RefundUnsupported {
        provider: String,
        original_reference: String,
    },

    /// The adapter rejected a refund attempt it does otherwise support.
    #[error("refund error: {0}")]
    RefundError(String),

    /// An illegal state transition was attempted — an internal bug or a
    /// race the row lock should have prevented. Not locally recoverable.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A webhook payload was structurally wrong during `handle_webhook`.
    #[error("webhook verification error: {0}")]
    WebhookVerificationError(String),

    /// Persistence-layer failure not otherwise classified above.
    #[error("storage error: {0}")]
    Storage(String),
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GatewayError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        GatewayError::NotFound(what.into())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
