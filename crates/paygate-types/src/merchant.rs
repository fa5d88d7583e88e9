//! Merchant identity and authentication principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A business identity onboarded onto the gateway. Immutable after creation
/// except for contact fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merchant {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub business_name: String,
    pub business_category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The authentication principal for a [`Merchant`]. Owns zero or more
/// [`crate::ProviderConfig`] rows indirectly through its merchant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub username: String,
    /// SHA-256 digest of the plaintext password (unsalted — see
    /// `paygate_crypto::hash_password`'s doc comment for the tradeoff).
    #[serde(skip_serializing)]
    pub password_digest: String,
    /// Opaque bearer token. Stored hashed at rest; the plaintext is only
    /// ever returned once, at signup/login time, wrapped by the AES-GCM
    /// envelope.
    #[serde(skip_serializing)]
    pub api_key_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for [`crate::error::GatewayError`]-producing signup calls.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub business_name: String,
    pub business_category: Option<String>,
    pub username: String,
    pub password: String,
}

/// The envelope returned to a merchant exactly once: their plaintext API key
/// wrapped with [`paygate_crypto`]'s AES-256-GCM seal, keyed on the merchant
/// id, so only the merchant's own channel can unwrap it.
#[derive(Debug, Clone, Serialize)]
pub struct SealedApiKey {
    pub merchant_id: Uuid,
    pub ciphertext_b64: String,
    pub iv_b64: String,
    pub alg: &'static str,
}
