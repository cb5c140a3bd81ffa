//! HTTP middleware for authentication, request hardening and observability.
//!
//! - **Current user**: hydrates the session's user on every request
//! - **Login gate**: HTMX-aware redirect of anonymous requests
//! - **CSRF**: per-session token on state-changing requests
//! - **Rate limiting**: per-client token bucket on the login form
//! - **Content type**: media type whitelist for form endpoints
//! - **Security headers**: host filtering, HSTS, frame and sniffing policy
//! - **Request stats**: duration histogram and the `monitor` table
//!
//! # Architecture
//!
//! ```text
//! Request → Security → Request ID → Trace → Stats → Session → Current User → Router
//!              ↓                                                   ↓
//!          403 Bad host                                     CurrentUser ext
//!
//! POST /auth/login → Rate Limit → Content Type → CSRF → handler
//!                        ↓             ↓           ↓
//!                   429 Too Many     415         400
//!
//! protected routes → Require User → handler
//!                         ↓
//!                 302 Location / 204 HX-Redirect
//! ```

pub mod content_type;
pub mod csrf;
pub mod current_user;
pub mod ip;
pub mod rate_limit;
pub mod request_stats;
pub mod security;

pub use content_type::AllowContentTypeLayer;
pub use csrf::{CSRF_MISMATCH, CsrfLayer};
pub use current_user::{CurrentUserLayer, LOGIN_PATH, RequireUserLayer, login_redirect};
pub use ip::{UNKNOWN_IP, client_ip};
pub use rate_limit::{RateLimitError, RateLimitLayer, TrustedProxyConfig};
pub use request_stats::{RequestStats, RequestStatsLayer, byte_si};
pub use security::SecurityHeadersLayer;
