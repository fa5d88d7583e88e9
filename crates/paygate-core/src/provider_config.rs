//! Per-merchant provider configuration loading and decryption.
//!
//! `ProviderConfig.config` is stored at rest as two parts: a `plain` object
//! of non-secret fields (base URLs, shortcodes, ...) and an optional
//! `sealed` envelope — the output of [`paygate_crypto::aes_gcm_seal`] over a
//! JSON object of the provider's secret fields (shared secrets, consumer
//! keys, passkeys), keyed on the merchant id exactly as the API-key
//! envelope is. `load` merges the two into one opaque map
//! and hands it to the matching adapter factory; the decrypted plaintext is
//! never logged.

use paygate_crypto::SealedEnvelope;
use paygate_store::ProviderRepository;
use paygate_types::{GatewayError, GatewayResult};
use serde_json::Value;
use uuid::Uuid;

#[derive(Clone)]
pub struct ProviderConfigService {
    providers: ProviderRepository,
}

impl ProviderConfigService {
    pub fn new(providers: ProviderRepository) -> Self {
        ProviderConfigService { providers }
    }

    /// Loads and decrypts a merchant's active configuration for
    /// `provider_short_name`, producing the opaque config map an adapter
    /// factory consumes. `GatewayError::ProviderNotConfigured` when absent
    /// or inactive.
    pub async fn load(&self, merchant_id: Uuid, provider_short_name: &str) -> GatewayResult<Value> {
        let stored = self.providers.load(merchant_id, provider_short_name).await?;
        decrypt_config(merchant_id, &stored.config)
    }

    /// Same as [`Self::load`] but by provider only, picking any merchant's
    /// active config. Used exclusively by the webhook pipeline, whose
    /// ingestion path is provider-scoped, not merchant-scoped — see
    /// DESIGN.md.
    pub async fn load_any(&self, provider_short_name: &str) -> GatewayResult<Value> {
        let stored = self
            .providers
            .find_any_active_config(provider_short_name)
            .await?
            .ok_or_else(|| GatewayError::ProviderNotConfigured(provider_short_name.to_string()))?;
        decrypt_config(stored.merchant_id, &stored.config)
    }
}

fn decrypt_config(merchant_id: Uuid, stored: &Value) -> GatewayResult<Value> {
    let mut merged = stored.get("plain").cloned().unwrap_or_else(|| Value::Object(Default::default()));

    if let Some(sealed_value) = stored.get("sealed") {
        let envelope: SealedEnvelope = serde_json::from_value(sealed_value.clone())
            .map_err(|e| GatewayError::Storage(format!("corrupt sealed provider config: {e}")))?;
        let plaintext = paygate_crypto::aes_gcm_open(merchant_id.as_bytes(), &envelope)
            .map_err(|_| GatewayError::Storage("failed to decrypt provider config secrets".to_string()))?;
        let secrets: Value = serde_json::from_slice(&plaintext)
            .map_err(|e| GatewayError::Storage(format!("corrupt decrypted provider config: {e}")))?;

        if let (Some(merged_obj), Some(secrets_obj)) = (merged.as_object_mut(), secrets.as_object()) {
            for (k, v) in secrets_obj {
                merged_obj.insert(k.clone(), v.clone());
            }
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merges_plain_fields_when_no_secrets_sealed() {
        let stored = json!({"plain": {"base_url": "https://x"}});
        let merged = decrypt_config(Uuid::new_v4(), &stored).unwrap();
        assert_eq!(merged["base_url"], "https://x");
    }

    #[test]
    fn decrypts_and_merges_sealed_secrets() {
        let merchant_id = Uuid::new_v4();
        let secrets = json!({"shared_secret": "top-secret"});
        let envelope = paygate_crypto::aes_gcm_seal(merchant_id.as_bytes(), secrets.to_string().as_bytes()).unwrap();
        let stored = json!({
            "plain": {"base_url": "https://x"},
            "sealed": {
                "ciphertext_b64": envelope.ciphertext_b64,
                "iv_b64": envelope.iv_b64,
                "alg": envelope.alg,
            }
        });
        let merged = decrypt_config(merchant_id, &stored).unwrap();
        assert_eq!(merged["base_url"], "https://x");
        assert_eq!(merged["shared_secret"], "top-secret");
    }
}
