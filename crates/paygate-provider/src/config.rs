//! Helpers for reading an adapter's opaque config map and failing fast with
//! a clear, field-naming error when a required key is absent.

use serde_json::Value;

use crate::adapter::AdapterError;

pub fn require_str<'a>(config: &'a Value, key: &str) -> Result<&'a str, AdapterError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AdapterError::MissingConfig(key.to_string()))
}

pub fn optional_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Validates a set of required keys all at once, returning a single error
/// that lists every absent field — used by operations that need more than
/// the base init config (e.g. the OAuth-gated provider's reversal/B2C/status
/// operations, which additionally require an initiator name, encrypted
/// security credential, result URL, and queue-timeout URL).
pub fn require_all(config: &Value, keys: &[&str]) -> Result<(), AdapterError> {
    let missing: Vec<&str> = keys
        .iter()
        .filter(|k| optional_str(config, k).is_none())
        .copied()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AdapterError::MissingConfig(missing.join(", ")))
    }
}
