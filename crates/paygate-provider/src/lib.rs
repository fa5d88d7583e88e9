//! Provider adapter contract and factory registry.
//!
//! This crate defines the normalised capability interface every upstream
//! payment provider adapter implements, plus the process-wide registry that
//! maps a provider's short name to a factory that can build an adapter
//! instance from a merchant's decrypted configuration. Individual adapters
//! (`paygate-provider-bankpay`, `-cpay`, `-cardgate`, `-mpesa`) depend on
//! this crate; it depends on none of them.

pub mod adapter;
pub mod config;
pub mod http;
pub mod registry;

pub use adapter::{AdapterError, InitPaymentOutcome, ProviderAdapter, RefundOutcome, VerifyPaymentOutcome, WebhookOutcome};
pub use registry::{ProviderFactory, ProviderRegistry};
