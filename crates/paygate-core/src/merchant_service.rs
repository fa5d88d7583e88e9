//! Merchant authentication and onboarding.

use paygate_crypto::SealedEnvelope;
use paygate_store::MerchantRepository;
use paygate_types::{Account, GatewayError, GatewayResult, Merchant, SealedApiKey, SignupRequest};

#[derive(Clone)]
pub struct MerchantService {
    merchants: MerchantRepository,
    api_key_prefix: String,
}

impl MerchantService {
    pub fn new(merchants: MerchantRepository, api_key_prefix: impl Into<String>) -> Self {
        MerchantService { merchants, api_key_prefix: api_key_prefix.into() }
    }

    /// Creates a Merchant and its Account atomically: hashes the password,
    /// generates an API key, and returns the plaintext key wrapped in an
    /// AES-GCM envelope keyed on the merchant id — the plaintext is never
    /// returned again. A username collision fails with
    /// `GatewayError::Validation`.
    pub async fn signup(&self, data: &SignupRequest) -> GatewayResult<(Merchant, SealedApiKey)> {
        let password_digest = paygate_crypto::hash_password(&data.password);
        let plaintext_key = paygate_crypto::random_api_key(&self.api_key_prefix);
        let api_key_hash = paygate_crypto::sha256_hex(&plaintext_key);

        let (merchant, _account) = self.merchants.create_merchant_and_account(data, password_digest, api_key_hash).await?;
        let sealed = seal_key(merchant.id, &plaintext_key)?;
        Ok((merchant, sealed))
    }

    /// Looks up an Account by `(username, sha256(password))`. Only the
    /// key's hash is retained at rest, so a hit cannot reveal the original
    /// plaintext again; `login` instead rotates to a freshly generated key,
    /// persists its hash, and returns it through the same sealed-envelope
    /// shape `signup` uses (see DESIGN.md for this departure).
    pub async fn login(&self, username: &str, password: &str) -> GatewayResult<SealedApiKey> {
        let account = self
            .merchants
            .find_account_by_username(username)
            .await?
            .ok_or(GatewayError::Unauthorized)?;

        if account.password_digest != paygate_crypto::hash_password(password) {
            return Err(GatewayError::Unauthorized);
        }

        let plaintext_key = paygate_crypto::random_api_key(&self.api_key_prefix);
        let api_key_hash = paygate_crypto::sha256_hex(&plaintext_key);
        self.merchants.update_api_key_hash(account.id, &api_key_hash).await?;

        seal_key(account.merchant_id, &plaintext_key)
    }

    /// The `X-API-Key` gate applied to every merchant endpoint: resolves
    /// the presented key to its owning Account, or `Unauthorized` on miss.
    pub async fn authenticate_api_key(&self, presented_key: &str) -> GatewayResult<Account> {
        let hash = paygate_crypto::sha256_hex(presented_key);
        self.merchants.find_account_by_api_key_hash(&hash).await?.ok_or(GatewayError::Unauthorized)
    }
}

fn seal_key(merchant_id: uuid::Uuid, plaintext_key: &str) -> GatewayResult<SealedApiKey> {
    let envelope: SealedEnvelope = paygate_crypto::aes_gcm_seal(merchant_id.as_bytes(), plaintext_key.as_bytes())
        .map_err(|_| GatewayError::Storage("failed to seal API key".to_string()))?;
    Ok(SealedApiKey {
        merchant_id,
        ciphertext_b64: envelope.ciphertext_b64,
        iv_b64: envelope.iv_b64,
        alg: envelope.alg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use paygate_types::Account as AccountType;
    use uuid::Uuid;

    fn test_account() -> AccountType {
        AccountType {
            id: Uuid::new_v4(),
            merchant_id: Uuid::new_v4(),
            username: "acme".to_string(),
            password_digest: paygate_crypto::hash_password("hunter2"),
            api_key_hash: paygate_crypto::sha256_hex("mch_live_abc123"),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn seal_key_roundtrips_through_crypto_layer() {
        let account = test_account();
        let sealed = seal_key(account.merchant_id, "mch_live_abc123").unwrap();
        let opened = paygate_crypto::aes_gcm_open(
            account.merchant_id.as_bytes(),
            &SealedEnvelope { ciphertext_b64: sealed.ciphertext_b64, iv_b64: sealed.iv_b64, alg: sealed.alg },
        )
        .unwrap();
        assert_eq!(opened, b"mch_live_abc123");
    }
}
