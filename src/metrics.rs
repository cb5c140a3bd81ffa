//! Prometheus metrics for application observability.
//!
//! Metrics are exposed by a dedicated HTTP listener on
//! `observability.metrics_port` (0 disables it).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `portico_login_attempts_total` - Login form submissions (label: outcome)
//! - `portico_rate_limit_rejections_total` - Requests answered 429 (label: path)
//! - `portico_csrf_rejections_total` - Requests failing the CSRF check
//! - `portico_auth_redirects_total` - Anonymous requests bounced to the login page (label: kind)
//!
//! ## Histograms
//! - `portico_http_request_duration_seconds` - Request duration (labels: path, method, status)
//!
//! # Usage
//!
//! ```rust,ignore
//! use portico::metrics::{try_init_metrics, record_login_attempt, LoginOutcome};
//!
//! try_init_metrics(addr);
//! record_login_attempt(LoginOutcome::Success);
//! ```

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const LOGIN_ATTEMPTS_TOTAL: &str = "portico_login_attempts_total";
    pub const RATE_LIMIT_REJECTIONS_TOTAL: &str = "portico_rate_limit_rejections_total";
    pub const CSRF_REJECTIONS_TOTAL: &str = "portico_csrf_rejections_total";
    pub const AUTH_REDIRECTS_TOTAL: &str = "portico_auth_redirects_total";
    pub const REQUEST_DURATION_SECONDS: &str = "portico_http_request_duration_seconds";
}

/// Result of a login form submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    /// Form failed validation before any lookup
    Invalid,
    /// Unknown email, inactive account or wrong password
    Rejected,
    Error,
}

impl LoginOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            LoginOutcome::Success => "success",
            LoginOutcome::Invalid => "invalid",
            LoginOutcome::Rejected => "rejected",
            LoginOutcome::Error => "error",
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// Sets up metric descriptions and starts the Prometheus HTTP listener.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (port in use,
/// or a recorder already installed).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::LOGIN_ATTEMPTS_TOTAL,
        "Total number of login form submissions by outcome"
    );
    describe_counter!(
        names::RATE_LIMIT_REJECTIONS_TOTAL,
        "Total number of requests rejected by the login rate limiter"
    );
    describe_counter!(
        names::CSRF_REJECTIONS_TOTAL,
        "Total number of requests rejected for a missing or wrong CSRF token"
    );
    describe_counter!(
        names::AUTH_REDIRECTS_TOTAL,
        "Total number of anonymous requests redirected to the login page"
    );
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_login_attempt(outcome: LoginOutcome) {
    counter!(names::LOGIN_ATTEMPTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_rate_limit_rejection(path: &str) {
    counter!(names::RATE_LIMIT_REJECTIONS_TOTAL, "path" => path.to_string()).increment(1);
}

pub fn record_csrf_rejection() {
    counter!(names::CSRF_REJECTIONS_TOTAL).increment(1);
}

/// `htmx` is true when the redirect went out as `HX-Redirect`.
pub fn record_auth_redirect(htmx: bool) {
    let kind = if htmx { "htmx" } else { "browser" };
    counter!(names::AUTH_REDIRECTS_TOTAL, "kind" => kind).increment(1);
}

/// Record HTTP request duration.
pub fn record_request_duration(path: &str, method: &str, status: u16, duration_secs: f64) {
    histogram!(
        names::REQUEST_DURATION_SECONDS,
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Recording without an installed exporter must be a silent no-op.

    #[test]
    fn test_record_login_attempt() {
        for outcome in [
            LoginOutcome::Success,
            LoginOutcome::Invalid,
            LoginOutcome::Rejected,
            LoginOutcome::Error,
        ] {
            record_login_attempt(outcome);
        }
    }

    #[test]
    fn test_record_rejections_and_duration() {
        record_rate_limit_rejection("/auth/login");
        record_csrf_rejection();
        record_auth_redirect(true);
        record_auth_redirect(false);
        record_request_duration("/", "GET", 200, 0.01);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(LoginOutcome::Success.as_str(), "success");
        assert_eq!(LoginOutcome::Rejected.as_str(), "rejected");
    }
}
