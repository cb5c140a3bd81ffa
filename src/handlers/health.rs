//! Health and readiness endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness: always 200 while the process serves requests
//! - `GET /ready` - Readiness: 503 when the user store does not answer

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::state::AppState;

/// Liveness response body.
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "uptime_seconds": 3600,
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint for load balancer and Kubernetes probes.
///
/// ```yaml
/// readinessProbe:
///   httpGet:
///     path: /ready
///     port: 3000
/// ```
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    match state.users.ping().await {
        Ok(()) => Ok(StatusCode::OK),
        Err(e) => {
            warn!(error = %e, "Readiness check failed: user store unavailable");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
