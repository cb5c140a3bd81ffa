//! Shared application state for Axum handlers.
//!
//! Cloned for every request; everything inside is an `Arc` or a cheap handle.
//!
//! # Structured Concurrency
//!
//! Background maintenance runs under a `TaskTracker` and stops when the
//! `CancellationToken` fires:
//!
//! - pruning idle login rate-limit buckets
//! - deleting expired sessions from the session store
//!
//! Call `shutdown()` before exit to wait for both.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::auth::SessionBackend;
use crate::config::Config;
use crate::db::UserStore;
use crate::error::{AppError, AppResult};
use crate::middleware::{RateLimitLayer, RequestStats};
use crate::styles::StyleSheet;

/// Shared application state for Axum handlers.
///
/// # Lifecycle
///
/// Background tasks are spawned on construction, so it must happen inside a
/// Tokio runtime:
///
/// ```rust,ignore
/// let state = AppState::new(users, SessionBackend::memory(), config)?;
/// // ... serve ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// User lookups for login and session hydration
    pub users: Arc<dyn UserStore>,
    /// Application configuration
    pub config: Arc<Config>,
    /// `/ui.css`, rendered once and cached
    pub stylesheet: Arc<StyleSheet>,
    /// Shared buckets for `POST /auth/login`; `None` when `login_rps = 0`
    pub login_limiter: Option<RateLimitLayer>,
    /// Store behind the session cookie
    pub session_backend: SessionBackend,
    /// Per-route counters for the `monitor` command
    pub request_stats: Option<Arc<RequestStats>>,
    /// Timestamp when the application started
    pub started_at: Instant,
    /// Tracks spawned background tasks for graceful shutdown
    task_tracker: TaskTracker,
    /// Cancellation token for signaling background tasks to stop
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Create the state and start its background tasks.
    ///
    /// # Errors
    ///
    /// `AppError::ConfigError` if the login rate limit cannot be built.
    pub fn new(
        users: Arc<dyn UserStore>,
        session_backend: SessionBackend,
        config: Config,
    ) -> AppResult<Self> {
        let login_limiter = if config.rate_limiting_enabled() {
            let limiter = RateLimitLayer::with_trusted_proxies(
                config.rate_limit.login_rps,
                config.rate_limit.login_burst,
                &config.security.trusted_proxies,
            )
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
            Some(limiter)
        } else {
            None
        };

        let state = Self {
            users,
            config: Arc::new(config),
            stylesheet: Arc::new(StyleSheet::new()),
            login_limiter,
            session_backend,
            request_stats: None,
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        state.spawn_limiter_prune_task();
        state.spawn_session_cleanup_task();

        Ok(state)
    }

    /// Collect per-route statistics for the `monitor` command.
    #[must_use]
    pub fn with_request_stats(mut self, stats: Arc<RequestStats>) -> Self {
        self.request_stats = Some(stats);
        self
    }

    /// Periodically forget rate-limit buckets that have refilled.
    fn spawn_limiter_prune_task(&self) {
        let Some(limiter) = self.login_limiter.clone() else {
            return;
        };
        let period = Duration::from_secs(self.config.rate_limit.prune_interval_secs.max(1));
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await; // Skip the first immediate tick

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!("Rate limiter prune task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        limiter.prune();
                        trace!(clients = limiter.tracked_clients(), "Pruned login rate limiter");
                    }
                }
            }

            debug!("Rate limiter prune task shutting down");
        });
    }

    /// Periodically delete expired sessions.
    fn spawn_session_cleanup_task(&self) {
        let backend = self.session_backend.clone();
        let period = Duration::from_secs(self.config.session.cleanup_interval_secs.max(1));
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(period);

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!("Session cleanup task received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = backend.delete_expired().await {
                            warn!(error = %e, "Failed to delete expired sessions");
                        } else {
                            trace!("Expired sessions deleted");
                        }
                    }
                }
            }

            debug!("Session cleanup task shutting down");
        });
    }

    /// Gracefully shutdown all background tasks.
    ///
    /// Signals cancellation, closes the tracker and waits for every task.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
