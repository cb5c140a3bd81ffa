//! Per-client rate limiting for login attempts.
//!
//! # Algorithm
//!
//! Governor's keyed limiter implements GCRA, equivalent to one token bucket
//! per client IP: `burst` requests pass at once, after which tokens refill
//! at `rps` per second. Buckets are created lazily on first sight of an IP
//! and live in a concurrent map; [`RateLimitLayer::prune`] drops the ones
//! that have refilled completely.
//!
//! # Response Headers
//!
//! On rate limit exceeded (429):
//! - `Retry-After`: Seconds until the next request will be accepted
//! - `X-RateLimit-Limit`: Configured RPS limit
//! - `X-RateLimit-Remaining`: Always `0`
//!
//! Client IPs are resolved by [`super::ip::client_ip`]; configure
//! `security.trusted_proxies` when running behind a reverse proxy.

use std::fmt;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::ip::client_ip;
use crate::metrics;

/// Error type for rate limit layer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// RPS value cannot be zero.
    ZeroRps,
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::ZeroRps => write!(
                f,
                "RPS must be greater than 0; set rate_limit.login_rps = 0 to disable limiting"
            ),
        }
    }
}

impl std::error::Error for RateLimitError {}

/// Per-IP limiter keyed by the textual client address.
type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

// =============================================================================
// Trusted Proxy CIDR Matching
// =============================================================================

/// Parsed CIDR network range for trusted proxy validation.
#[derive(Debug, Clone)]
pub struct CidrRange {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrRange {
    /// Parse a CIDR notation string (e.g., "10.0.0.0/8" or "::1/128").
    ///
    /// A bare address is treated as a /32 or /128. Returns `None` if the
    /// format is invalid.
    pub fn parse(cidr: &str) -> Option<Self> {
        let cidr = cidr.trim();

        let Some((addr, prefix)) = cidr.split_once('/') else {
            let ip: IpAddr = cidr.parse().ok()?;
            return Some(Self {
                network: ip,
                prefix_len: max_prefix(&ip),
            });
        };

        let ip: IpAddr = addr.parse().ok()?;
        let prefix_len: u8 = prefix.parse().ok()?;

        if prefix_len > max_prefix(&ip) {
            return None;
        }

        Some(Self {
            network: ip,
            prefix_len,
        })
    }

    /// Check if an IP address is contained within this CIDR range.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (&self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(addr)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u32::MAX << (32 - self.prefix_len)
                };
                (u32::from(*net) & mask) == (u32::from(*addr) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(addr)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u128::MAX << (128 - self.prefix_len)
                };
                (u128::from(*net) & mask) == (u128::from(*addr) & mask)
            }
            // IPv4-mapped IPv6 peers are matched against IPv4 ranges
            (IpAddr::V4(_), IpAddr::V6(addr)) => addr
                .to_ipv4_mapped()
                .is_some_and(|v4| self.contains(&IpAddr::V4(v4))),
            _ => false,
        }
    }
}

fn max_prefix(ip: &IpAddr) -> u8 {
    match ip {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

/// Trusted reverse proxies, whose forwarding headers are believed.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxyConfig {
    ranges: Vec<CidrRange>,
}

impl TrustedProxyConfig {
    /// Create a new trusted proxy configuration from CIDR strings.
    ///
    /// Invalid CIDR strings are logged as warnings and skipped.
    pub fn new(cidrs: &[String]) -> Self {
        let ranges: Vec<CidrRange> = cidrs
            .iter()
            .filter_map(|cidr| {
                let parsed = CidrRange::parse(cidr);
                if parsed.is_none() {
                    warn!(cidr = %cidr, "Invalid CIDR range in SECURITY_TRUSTED_PROXIES, skipping");
                }
                parsed
            })
            .collect();

        if !ranges.is_empty() {
            debug!(count = ranges.len(), "Trusted proxy validation enabled");
        }

        Self { ranges }
    }

    /// Check if trusted proxy validation is enabled (any ranges configured).
    pub fn is_enabled(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// Whether `ip` may set forwarding headers.
    ///
    /// Every address is trusted when no ranges are configured.
    pub fn is_trusted(&self, ip: &IpAddr) -> bool {
        self.ranges.is_empty() || self.ranges.iter().any(|range| range.contains(ip))
    }
}

// =============================================================================
// Layer
// =============================================================================

/// Per-IP rate limiting layer.
///
/// Clones share the same buckets, so one instance can be kept in the
/// application state for pruning while another wraps the route.
///
/// ```rust,ignore
/// let limiter = RateLimitLayer::with_trusted_proxies(2, 5, &[])?;
/// let login = post(login).layer(limiter.clone());
/// ```
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<KeyedLimiter>,
    /// Configured RPS limit (for headers)
    limit: u32,
    trusted_proxies: Arc<TrustedProxyConfig>,
}

impl fmt::Debug for RateLimitLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitLayer")
            .field("limit", &self.limit)
            .field("tracked_clients", &self.limiter.len())
            .field("trusted_proxies", &self.trusted_proxies)
            .finish()
    }
}

impl RateLimitLayer {
    /// Create a per-IP limiter that trusts forwarding headers from anyone.
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroRps` if `rps` is 0.
    pub fn new(rps: u32, burst: u32) -> Result<Self, RateLimitError> {
        Self::with_trusted_proxies(rps, burst, &[])
    }

    /// Create a per-IP limiter with trusted proxy configuration.
    ///
    /// # Arguments
    ///
    /// * `rps` - Sustained requests per second per IP
    /// * `burst` - Requests allowed at once per IP (minimum 1)
    /// * `trusted_proxies` - CIDR ranges for trusted reverse proxies
    ///
    /// # Errors
    ///
    /// Returns `RateLimitError::ZeroRps` if `rps` is 0.
    pub fn with_trusted_proxies(
        rps: u32,
        burst: u32,
        trusted_proxies: &[String],
    ) -> Result<Self, RateLimitError> {
        let rps_nonzero = NonZeroU32::new(rps).ok_or(RateLimitError::ZeroRps)?;
        let burst_nonzero = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);

        let quota = Quota::per_second(rps_nonzero).allow_burst(burst_nonzero);

        Ok(Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            limit: rps,
            trusted_proxies: Arc::new(TrustedProxyConfig::new(trusted_proxies)),
        })
    }

    /// Drop buckets that are indistinguishable from fresh ones.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of client buckets currently held.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            limit: self.limit,
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }
}

/// Rate limiting service wrapper.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<KeyedLimiter>,
    limit: u32,
    trusted_proxies: Arc<TrustedProxyConfig>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let limiter = self.limiter.clone();
        let limit = self.limit;
        let mut inner = self.inner.clone();

        // Governor's keyed limiter needs an owned key
        let client_ip = client_ip(&req, &self.trusted_proxies).into_owned();

        Box::pin(async move {
            match limiter.check_key(&client_ip) {
                Ok(()) => inner.call(req).await,
                Err(not_until) => {
                    let wait_time = not_until.wait_time_from(DefaultClock::default().now());
                    let retry_after = wait_time.as_secs().max(1);

                    warn!(
                        client_ip = %client_ip,
                        path = %req.uri().path(),
                        retry_after_secs = retry_after,
                        "Rate limit exceeded for IP"
                    );
                    metrics::record_rate_limit_rejection(req.uri().path());

                    let response = (
                        StatusCode::TOO_MANY_REQUESTS,
                        [
                            ("Retry-After", retry_after.to_string()),
                            ("X-RateLimit-Limit", limit.to_string()),
                            ("X-RateLimit-Remaining", "0".to_string()),
                        ],
                        "Too many attempts. Please retry later.",
                    )
                        .into_response();

                    Ok(response)
                }
            }
        })
    }
}
