//! Builds the per-request [`paygate_types::AuditContext`] recorded on every
//! audit write: the caller's IP (proxy-header aware), their `User-Agent`,
//! and the authenticated account's id when one is present.
//!
//! Mirrors the original gateway's request-scoped audit capture: client IP
//! prefers `X-Forwarded-For` (first hop of a comma-separated chain), falls
//! back to `X-Real-IP`, and finally the peer address off the TCP
//! connection itself.

use std::net::SocketAddr;

use axum::http::HeaderMap;
use paygate_types::AuditContext;

use crate::auth::AuthenticatedAccount;

fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(first_hop) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(first_hop.to_string());
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty()) {
        return Some(real_ip.to_string());
    }
    peer.map(|addr| addr.ip().to_string())
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers.get("user-agent").and_then(|v| v.to_str().ok()).map(str::to_string)
}

/// Audit context for an authenticated merchant request.
pub fn for_account(headers: &HeaderMap, peer: Option<SocketAddr>, account: &AuthenticatedAccount) -> AuditContext {
    AuditContext { user_id: Some(account.0.id), client_ip: client_ip(headers, peer), user_agent: user_agent(headers) }
}

/// Audit context for an unauthenticated inbound webhook: no user id, but
/// the caller's IP and user agent are still captured.
pub fn for_webhook(headers: &HeaderMap, peer: Option<SocketAddr>) -> AuditContext {
    AuditContext { user_id: None, client_ip: client_ip(headers, peer), user_agent: user_agent(headers) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        headers
    }

    #[test]
    fn prefers_first_hop_of_x_forwarded_for() {
        let headers = headers_with(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1"), ("x-real-ip", "10.0.0.2")]);
        assert_eq!(client_ip(&headers, None), Some("203.0.113.7".to_string()));
    }

    #[test]
    fn falls_back_to_x_real_ip() {
        let headers = headers_with(&[("x-real-ip", "198.51.100.9")]);
        assert_eq!(client_ip(&headers, None), Some("198.51.100.9".to_string()));
    }

    #[test]
    fn falls_back_to_peer_address() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "127.0.0.1:54321".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn no_context_available_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, None), None);
    }

    #[test]
    fn reads_user_agent_header() {
        let headers = headers_with(&[("user-agent", "curl/8.0")]);
        assert_eq!(user_agent(&headers), Some("curl/8.0".to_string()));
    }
}
