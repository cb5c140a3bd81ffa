//! # Portico
//!
//! Boilerplate for server-rendered web applications on Axum:
//!
//! - **Sessions**: encrypted cookie, memory or PostgreSQL store
//! - **CSRF**: per-session token checked on every unsafe request
//! - **Login**: Argon2 passwords, per-IP rate limiting, HTMX-aware redirects
//! - **Styles**: the `/ui.css` stylesheet generated from Rust values
//! - **CLI**: server, monitor, user management and migrations
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Security → Request ID → Trace → Session → User)│
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (auth, home, assets, health) + askama templates   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  UserStore (PostgreSQL, in-memory for tests)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use portico::auth::SessionBackend;
//! use portico::db::MemoryUserStore;
//! use portico::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let state = AppState::new(
//!         Arc::new(MemoryUserStore::new()),
//!         SessionBackend::memory(),
//!         config,
//!     )?;
//!     let app = build_router(state)?;
//!
//!     // Serve `app` with connect info so the rate limiter sees client IPs...
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod htmx;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod styles;
pub mod templates;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
