//! Authentication building blocks: password hashing, session keys,
//! CSRF tokens and the extractors handlers use to see the current user.

pub mod csrf;
pub mod extract;
pub mod memory_store;
pub mod password;
pub mod session;

pub use csrf::{CSRF_FORM_FIELD, CSRF_HEADER, CsrfToken, ensure_token};
pub use extract::{AuthUser, CurrentUser, MaybeUser};
pub use memory_store::MemorySessionStore;
pub use password::{hash_password, verify_password};
pub use session::{SessionBackend, session_layer};
