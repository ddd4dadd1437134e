//! Client IP resolution from trusted proxy headers.
//!
//! Priority: `CF-Connecting-IP` (Cloudflare) -> rightmost `X-Forwarded-For`
//! (appended by the closest trusted proxy) -> socket peer address. The socket
//! peer is only meaningful when the server is reached directly (local dev).

use axum::extract::{ConnectInfo, Request};
use std::net::{IpAddr, SocketAddr};

pub fn header_str<'a>(headers: &'a http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolve the client IP from proxy headers alone.
pub fn from_headers(headers: &http::HeaderMap) -> Option<IpAddr> {
    if let Some(ip) = header_str(headers, "cf-connecting-ip").and_then(|s| s.parse().ok()) {
        return Some(ip);
    }
    if let Some(xff) = header_str(headers, "x-forwarded-for")
        && let Some(ip) = xff
            .rsplit(',')
            .next()
            .map(str::trim)
            .and_then(|s| s.parse().ok())
    {
        return Some(ip);
    }
    None
}

/// Resolve the client IP for a request: proxy headers first, then the
/// connection's peer address.
pub fn resolve(req: &Request) -> Option<IpAddr> {
    from_headers(req.headers()).or_else(|| {
        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cloudflare_header_wins() {
        let mut headers = http::HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.9"));
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.1, 10.0.0.1"),
        );
        assert_eq!(
            from_headers(&headers),
            Some("203.0.113.9".parse::<IpAddr>().unwrap())
        );
    }

    #[test]
    fn rightmost_forwarded_entry_is_used() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.1, 10.0.0.1"),
        );
        assert_eq!(
            from_headers(&headers),
            Some("10.0.0.1".parse::<IpAddr>().unwrap())
        );
    }

    #[test]
    fn no_headers_means_unresolved() {
        assert_eq!(from_headers(&http::HeaderMap::new()), None);
    }
}
