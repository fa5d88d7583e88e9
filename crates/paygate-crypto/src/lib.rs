//! Crypto primitives for the payment gateway.
//!
//! Four pure operations with no shared state: HMAC-SHA256 request signing
//! (used both to sign outbound provider requests and, where a provider's
//! protocol carries one, to verify inbound webhook signatures), an
//! AES-256-GCM envelope used to wrap an API key in transit, unsalted
//! SHA-256 password hashing (see DESIGN.md's open-question note), and a
//! cryptographically random API key generator.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Computes the hex-encoded HMAC-SHA256 digest of `message` keyed by
/// `secret`. Used both for provider request signing and, where a provider
/// carries a signature in-band, webhook verification.
///
/// The result is always 64 hex characters.
pub fn hmac_sha256(secret: &[u8], message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time-safe comparison of a freshly computed HMAC against a
/// caller-supplied hex digest.
pub fn verify_hmac_sha256(secret: &[u8], message: &[u8], expected_hex: &str) -> bool {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message);
    match hex::decode(expected_hex) {
        Ok(expected_bytes) => mac.verify_slice(&expected_bytes).is_ok(),
        Err(_) => false,
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SealedEnvelope {
    pub ciphertext_b64: String,
    pub iv_b64: String,
    pub alg: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("failed to seal payload")]
    SealFailed,
    #[error("failed to open envelope")]
    OpenFailed,
}

/// Derives a 32-byte AES key from arbitrary caller-supplied material by
/// right-padding with zero bytes or truncating.
fn derive_key32(key_material: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    let n = key_material.len().min(32);
    key[..n].copy_from_slice(&key_material[..n]);
    key
}

/// Seals `plaintext` under AES-256-GCM with a fresh random 12-byte IV,
/// deriving the key from `key_material` per [`derive_key32`]. Used to wrap a
/// merchant's API key for the signup/login response.
pub fn aes_gcm_seal(key_material: &[u8], plaintext: &[u8]) -> Result<SealedEnvelope, CryptoError> {
    let key32 = derive_key32(key_material);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key32));

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| CryptoError::SealFailed)?;

    Ok(SealedEnvelope {
        ciphertext_b64: b64.encode(ciphertext),
        iv_b64: b64.encode(nonce),
        alg: "AES-256-GCM",
    })
}

/// Reverses [`aes_gcm_seal`]. Used by the admin/provider-config surface to
/// decrypt `ProviderConfig.config` credentials on read; the gateway never
/// logs the opened plaintext.
pub fn aes_gcm_open(key_material: &[u8], envelope: &SealedEnvelope) -> Result<Vec<u8>, CryptoError> {
    let key32 = derive_key32(key_material);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key32));

    let iv_bytes = b64.decode(&envelope.iv_b64).map_err(|_| CryptoError::OpenFailed)?;
    let nonce = Nonce::from_slice(&iv_bytes);
    let ciphertext = b64
        .decode(&envelope.ciphertext_b64)
        .map_err(|_| CryptoError::OpenFailed)?;

    cipher
        .decrypt(nonce, ciphertext.as_slice())
        .map_err(|_| CryptoError::OpenFailed)
}

/// Hex-encoded SHA-256 digest of `s`.
pub fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hashes an account password. The current design uses unsalted SHA-256;
/// swap the body for a memory-hard KDF behind this same signature if a
/// password-storage migration is ever in scope.
pub fn hash_password(plaintext: &str) -> String {
    sha256_hex(plaintext)
}

/// Generates a cryptographically random, URL-safe API key prefixed with
/// `prefix` (e.g. `mch_live_`).
pub fn random_api_key(prefix: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("{prefix}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_digest_is_64_hex_chars() {
        let digest = hmac_sha256(b"secret", b"message");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hmac_verification_roundtrips() {
        let digest = hmac_sha256(b"secret", b"message");
        assert!(verify_hmac_sha256(b"secret", b"message", &digest));
        assert!(!verify_hmac_sha256(b"secret", b"message", "wrong_sig"));
    }

    #[test]
    fn seal_and_open_roundtrip() {
        let key = b"merchant-id-used-as-key-material";
        let sealed = aes_gcm_seal(key, b"mch_live_abc123").unwrap();
        let opened = aes_gcm_open(key, &sealed).unwrap();
        assert_eq!(opened, b"mch_live_abc123");
    }

    #[test]
    fn random_api_key_carries_prefix() {
        let key = random_api_key("mch_live_");
        assert!(key.starts_with("mch_live_"));
        assert_eq!(key.len(), "mch_live_".len() + 32);
    }
}
