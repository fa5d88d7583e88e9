//! Static provider registry entries and per-merchant provider activation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A statically registered upstream, e.g. `standard_bank_pay`, `mpesa`,
/// `cpay`. One row per supported upstream; the short name is what
/// merchants, adapters, and the provider registry key off of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub short_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-merchant, per-provider activation and credentials.
///
/// `config` is an opaque JSON blob whose recognised keys are provider
/// specific, consumed only inside the matching adapter: no up-casting, no
/// typed schema pushed across adapters. Credentials within it are encrypted
/// at rest and decrypted only when constructing an adapter instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub provider_id: Uuid,
    pub provider_short_name: String,
    pub is_active: bool,
    pub config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
