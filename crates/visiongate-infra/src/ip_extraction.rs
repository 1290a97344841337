//! Client address resolution for admission control
//!
//! Forwarding headers are client-controlled. They are read only when the
//! service sits behind `trusted_proxy_count` proxies of its own, and only as
//! far back as those proxies vouch for. In every other case the socket peer
//! is the client.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

/// Rate-limit key used when no address can be resolved.
pub const UNKNOWN_CLIENT_KEY: &str = "ip:unknown";

/// Resolve the client IP from trusted proxy headers or the socket peer.
///
/// With `trusted_proxy_count = N > 0`, the last N entries of
/// `X-Forwarded-For` were appended by our own proxies and the entry just
/// before them is the client. A chain of N entries or fewer says nothing the
/// proxies vouch for, so it falls through to `X-Real-IP` (set by the nearest
/// trusted proxy) and then to the socket peer. With `N = 0` both headers are
/// ignored.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<SocketAddr>,
    trusted_proxy_count: usize,
) -> Option<IpAddr> {
    let peer = socket_addr.map(|addr| addr.ip());
    if trusted_proxy_count == 0 {
        return peer;
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| from_forwarded_for(v, trusted_proxy_count))
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<IpAddr>().ok())
        })
        .or(peer)
}

/// Rate-limit key for a request, `ip:<addr>` or `ip:unknown`.
pub fn client_key(
    headers: &HeaderMap,
    socket_addr: Option<SocketAddr>,
    trusted_proxy_count: usize,
) -> String {
    match extract_client_ip(headers, socket_addr, trusted_proxy_count) {
        Some(ip) => format!("ip:{}", ip),
        None => UNKNOWN_CLIENT_KEY.to_string(),
    }
}

fn from_forwarded_for(header_value: &str, trusted_proxy_count: usize) -> Option<IpAddr> {
    let chain: Vec<&str> = header_value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if trusted_proxy_count == 0 || chain.len() <= trusted_proxy_count {
        return None;
    }
    chain
        .get(chain.len() - trusted_proxy_count - 1)?
        .parse::<IpAddr>()
        .ok()
}
