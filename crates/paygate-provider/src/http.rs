//! Shared outbound HTTP client construction.
//!
//! All adapter HTTP calls carry a 15-30s timeout. Adapters share
//! the process's connection pool through [`reqwest::Client`]'s own internal
//! pooling; instances are cheap to clone.

use std::time::Duration;

/// Builds a client with the given timeout, clamped into the documented
/// 15-30s range.
pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    let timeout = timeout.clamp(Duration::from_secs(15), Duration::from_secs(30));
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("reqwest client configuration is static and always valid")
}

/// The default timeout used when an adapter has no specific reason to
/// deviate: 20 seconds, squarely inside the 15-30s window.
pub fn default_http_client() -> reqwest::Client {
    build_http_client(Duration::from_secs(20))
}
