//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │  Security        │ ← 403 for unlisted hosts, hardening headers
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Sets and propagates x-request-id
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging (off in monitor mode)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Request Stats   │ ← Duration histogram, monitor table
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │    Session       │ ← Encrypted cookie → session store
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Current User    │ ← CurrentUser extension
//! └────────┬─────────┘
//!          ▼
//!   Route layers, then Handler
//! ```
//!
//! # Route Groups
//!
//! - `/`, `/auth/user-menu` - Login required (302 or HX-Redirect to the login page)
//! - `/auth/login`, `/auth/logout` - Public; the login POST is rate limited,
//!   form-only and CSRF checked
//! - `/ui.css`, `/static/*` - Assets
//! - `/health`, `/ready` - Probes

use std::convert::Infallible;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{MethodRouter, get, post};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::session_layer;
use crate::error::AppResult;
use crate::handlers;
use crate::middleware::{
    AllowContentTypeLayer, CsrfLayer, CurrentUserLayer, RequestStatsLayer, RequireUserLayer,
    SecurityHeadersLayer,
};
use crate::state::AppState;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Build the application router with all routes and middleware configured.
///
/// - **Login rate limiting**: enabled if `rate_limit.login_rps > 0`
/// - **Request logging**: replaced by the stats table when the state carries
///   [`RequestStats`](crate::middleware::RequestStats)
///
/// # Errors
///
/// Returns `AppError::ConfigError` if the session key is invalid.
pub fn build_router(state: AppState) -> AppResult<Router> {
    let config = &state.config;
    let body_limit = config.server.max_request_body_size;

    // =========================================================================
    // Routes
    // =========================================================================

    // Layers wrap outward: the rate limiter runs first, CSRF last
    let mut login_submit: MethodRouter<AppState> = post(handlers::login)
        .layer::<_, Infallible>(CsrfLayer::new(body_limit))
        .layer(AllowContentTypeLayer::new([FORM_URLENCODED]));
    if let Some(limiter) = &state.login_limiter {
        info!(
            rps = config.rate_limit.login_rps,
            burst = config.rate_limit.login_burst,
            trusted_proxies = config.security.trusted_proxies.len(),
            "Login rate limiting enabled"
        );
        login_submit = login_submit.layer(limiter.clone());
    } else {
        info!("Login rate limiting disabled (RATE_LIMIT_LOGIN_RPS=0)");
    }

    let public = Router::new()
        .route(
            "/auth/login",
            get(handlers::login_form).layer(CsrfLayer::new(body_limit)),
        )
        .route("/auth/login", login_submit)
        .route("/auth/logout", get(handlers::logout))
        .route("/ui.css", get(handlers::ui_css))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .nest_service("/static", ServeDir::new(&config.server.static_dir));

    let protected = Router::new()
        .route("/", get(handlers::home))
        .route("/auth/user-menu", get(handlers::user_menu))
        .route_layer(RequireUserLayer::new(state.users.clone()));

    let mut router = Router::new().merge(public).merge(protected);

    // =========================================================================
    // Apply Middleware Stack (order matters - applied bottom to top)
    // =========================================================================

    // 1. Current user (innermost, needs the session)
    router = router.layer(CurrentUserLayer::new(state.users.clone()));

    // 2. Sessions
    router = router.layer(session_layer(
        &config.session,
        state.session_backend.clone(),
    )?);
    if config.session.uses_dev_key() {
        warn!("Using the development session key; set SESSION_KEY in production");
    }

    // 3. Request statistics
    router = match &state.request_stats {
        Some(stats) => router.layer(RequestStatsLayer::with_stats(stats.clone())),
        None => router.layer(RequestStatsLayer::new()),
    };

    // 4. Tracing (the monitor table replaces request logs)
    if state.request_stats.is_none() {
        router = router.layer(TraceLayer::new_for_http());
    }

    // 5. Request ID: set on the way in, copied to the response on the way out
    router = router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    // 6. Security headers and host filtering
    router = router.layer(SecurityHeadersLayer::new(&config.security));

    // 7. Request body size limit
    info!(
        max_size_kb = body_limit / 1024,
        "Request body size limit configured"
    );
    router = router.layer(DefaultBodyLimit::max(body_limit));

    Ok(router.with_state(state))
}
