//! Client IP resolution for per-client rate limiting.
//!
//! # Resolution Order
//!
//! 1. The TCP peer address from `ConnectInfo<SocketAddr>` is the ground truth.
//! 2. If the peer is a trusted proxy, the first `X-Forwarded-For` entry or
//!    `X-Real-IP` replaces it.
//! 3. With no trusted proxies configured every peer counts as trusted, which
//!    keeps local setups behind a dev proxy working. Do not expose such a
//!    deployment directly: clients could then pick their own key.
//! 4. With nothing to go on, all requests share [`UNKNOWN_IP`].
//!
//! `ConnectInfo` is only present when the server is started with
//! `into_make_service_with_connect_info::<SocketAddr>()`.
//!
//! ```text
//!   peer ──► trusted? ──yes──► X-Forwarded-For ──► X-Real-IP ──► peer
//!              │
//!              no
//!              ▼
//!             peer
//! ```

use std::borrow::Cow;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use tracing::debug;

use super::rate_limit::TrustedProxyConfig;

/// Fallback key when no client IP can be determined.
///
/// All requests without identifiable IPs share this key, so a flood of them
/// is limited collectively.
pub const UNKNOWN_IP: &str = "unknown";

/// Where a forwarded address came from, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forwarded<'a> {
    Xff(&'a str),
    RealIp(&'a str),
    None,
}

/// Read the client address a proxy reported, without allocating.
#[inline]
fn forwarded_ip<B>(req: &Request<B>) -> Forwarded<'_> {
    // "client, proxy1, proxy2": the first entry is the client
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first_ip) = value.split(',').next()
        && !first_ip.trim().is_empty()
    {
        return Forwarded::Xff(first_ip.trim());
    }

    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && !value.trim().is_empty()
    {
        return Forwarded::RealIp(value.trim());
    }

    Forwarded::None
}

/// TCP peer address, if the server recorded it.
#[inline]
pub fn peer_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Resolve the rate-limit key for a request.
///
/// Returns `Cow::Borrowed` for the [`UNKNOWN_IP`] fallback so the common
/// header-less test path does not allocate.
pub fn client_ip<B>(req: &Request<B>, trusted_proxies: &TrustedProxyConfig) -> Cow<'static, str> {
    let peer = peer_ip(req);

    let peer_trusted = match peer {
        Some(ip) => trusted_proxies.is_trusted(&ip),
        // No peer to check; only trust headers when no proxies are configured
        None => !trusted_proxies.is_enabled(),
    };

    if peer_trusted {
        match forwarded_ip(req) {
            Forwarded::Xff(ip) => {
                debug!(client_ip = %ip, peer = ?peer, "Client IP from X-Forwarded-For");
                return Cow::Owned(ip.to_string());
            }
            Forwarded::RealIp(ip) => {
                debug!(client_ip = %ip, peer = ?peer, "Client IP from X-Real-IP");
                return Cow::Owned(ip.to_string());
            }
            Forwarded::None => {}
        }
    } else if forwarded_ip(req) != Forwarded::None {
        debug!(peer = ?peer, "Ignoring forwarding headers from untrusted peer");
    }

    match peer {
        Some(ip) => Cow::Owned(ip.to_string()),
        None => Cow::Borrowed(UNKNOWN_IP),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(headers: &[(&str, &str)], peer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    fn open() -> TrustedProxyConfig {
        TrustedProxyConfig::default()
    }

    fn proxies() -> TrustedProxyConfig {
        TrustedProxyConfig::new(&["10.0.0.0/8".to_string()])
    }

    #[test]
    fn test_peer_without_headers() {
        let req = request(&[], Some("203.0.113.7:51000"));
        assert_eq!(client_ip(&req, &open()), "203.0.113.7");
        assert_eq!(client_ip(&req, &proxies()), "203.0.113.7");
    }

    #[test]
    fn test_xff_first_entry_from_trusted_peer() {
        let req = request(
            &[("x-forwarded-for", "  192.168.1.1  , 10.0.0.1")],
            Some("10.1.2.3:443"),
        );
        assert_eq!(client_ip(&req, &proxies()), "192.168.1.1");
    }

    #[test]
    fn test_headers_ignored_from_untrusted_peer() {
        let req = request(
            &[("x-forwarded-for", "1.1.1.1"), ("x-real-ip", "2.2.2.2")],
            Some("203.0.113.7:51000"),
        );
        assert_eq!(client_ip(&req, &proxies()), "203.0.113.7");
    }

    #[test]
    fn test_headers_honored_when_no_proxies_configured() {
        let req = request(&[("x-forwarded-for", "198.51.100.4")], Some("127.0.0.1:9000"));
        assert_eq!(client_ip(&req, &open()), "198.51.100.4");

        let req = request(&[("x-real-ip", "198.51.100.5")], None);
        assert_eq!(client_ip(&req, &open()), "198.51.100.5");
    }

    #[test]
    fn test_xff_priority_over_real_ip() {
        let req = request(
            &[("x-forwarded-for", "10.0.0.1"), ("x-real-ip", "192.168.1.1")],
            None,
        );
        assert_eq!(client_ip(&req, &open()), "10.0.0.1");
    }

    #[test]
    fn test_empty_xff_falls_through_to_real_ip() {
        let req = request(&[("x-forwarded-for", "  "), ("x-real-ip", "::1")], None);
        assert_eq!(client_ip(&req, &open()), "::1");
    }

    #[test]
    fn test_unknown_is_borrowed() {
        let req = request(&[], None);
        let ip = client_ip(&req, &open());
        assert_eq!(ip, UNKNOWN_IP);
        assert!(matches!(ip, Cow::Borrowed(_)));
    }

    #[test]
    fn test_no_peer_with_proxies_configured_ignores_headers() {
        let req = request(&[("x-forwarded-for", "1.1.1.1")], None);
        assert_eq!(client_ip(&req, &proxies()), UNKNOWN_IP);
    }

    #[test]
    fn test_ipv6_peer() {
        let req = request(&[], Some("[2001:db8::1]:8080"));
        assert_eq!(client_ip(&req, &proxies()), "2001:db8::1");
    }
}
