//! The shape memoised by the idempotency cache. Keyed in the cache, not the
//! durable store — the two layers have different lifetimes by design, with
//! the durable unique-index backstopping correctness when the cache misses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub status_code: u16,
    pub body: serde_json::Value,
}

pub fn cache_key(client_key: &str) -> String {
    format!("idempotency:{client_key}")
}

/// `Idempotency-Key` header constraint: 10-255 chars, `[A-Za-z0-9_-]+`.
pub fn is_valid_idempotency_key(key: &str) -> bool {
    if key.len() < 10 || key.len() > 255 {
        return false;
    }
    key.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_lengths() {
        assert!(!is_valid_idempotency_key(&"a".repeat(9)));
        assert!(is_valid_idempotency_key(&"a".repeat(10)));
        assert!(is_valid_idempotency_key(&"a".repeat(255)));
        assert!(!is_valid_idempotency_key(&"a".repeat(256)));
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(!is_valid_idempotency_key("has a space_ok_len10"));
        assert!(is_valid_idempotency_key("HP-001_abcd"));
    }
}
