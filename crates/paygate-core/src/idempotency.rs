//! Request-idempotency response cache.
//!
//! Best-effort, in-process, process-wide. A miss after a `set` under
//! partition (or a restart) is acceptable — correctness for the actual
//! mutating effect is preserved by `Transaction.idempotency_key` being
//! `UNIQUE` at the durable layer, which [`crate::transaction_service`]
//! relies on as the backstop.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use paygate_types::idempotency::cache_key;
use paygate_types::IdempotencyRecord;

/// Default TTL for a memoised response.
pub const DEFAULT_TTL_SECONDS: u64 = 86_400;

struct Entry {
    record: IdempotencyRecord,
    expires_at: Instant,
}

/// A keyed string cache with per-entry TTL. `get`/`set`/`delete` are the
/// three public operations; a fourth, private `sweep`, is run
/// opportunistically on `set` to bound memory growth rather than on a
/// background timer (kept here, not delegated to an external scheduler,
/// since it has no observable effect on correctness).
#[derive(Default)]
pub struct IdempotencyCache {
    entries: DashMap<String, Entry>,
}

impl IdempotencyCache {
    pub fn new() -> Self {
        IdempotencyCache { entries: DashMap::new() }
    }

    pub fn get(&self, client_key: &str) -> Option<IdempotencyRecord> {
        let key = cache_key(client_key);
        match self.entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.record.clone()),
            Some(_) => {
                drop(self.entries.remove(&key));
                None
            }
            None => None,
        }
    }

    pub fn set(&self, client_key: &str, record: IdempotencyRecord, ttl_seconds: u64) {
        let key = cache_key(client_key);
        self.entries.insert(
            key,
            Entry {
                record,
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );
        if self.entries.len() % 256 == 0 {
            self.sweep();
        }
    }

    pub fn delete(&self, client_key: &str) {
        self.entries.remove(&cache_key(client_key));
    }

    fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(code: u16) -> IdempotencyRecord {
        IdempotencyRecord { status_code: code, body: json!({"ok": true}) }
    }

    #[test]
    fn distinct_keys_never_collide() {
        let cache = IdempotencyCache::new();
        cache.set("HP-001-abcdef", record(201), DEFAULT_TTL_SECONDS);
        cache.set("HP-002-abcdef", record(200), DEFAULT_TTL_SECONDS);
        assert_eq!(cache.get("HP-001-abcdef").unwrap().status_code, 201);
        assert_eq!(cache.get("HP-002-abcdef").unwrap().status_code, 200);
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = IdempotencyCache::new();
        cache.set("HP-003-abcdef", record(201), 0);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("HP-003-abcdef").is_none());
    }

    #[test]
    fn delete_removes_entry() {
        let cache = IdempotencyCache::new();
        cache.set("HP-004-abcdef", record(201), DEFAULT_TTL_SECONDS);
        cache.delete("HP-004-abcdef");
        assert!(cache.get("HP-004-abcdef").is_none());
    }
}
