//! Per-session CSRF tokens.
//!
//! Tokens are 32 random bytes, base64url encoded without padding. One token
//! lives in each session from the first page that needs it until login
//! rotates it or logout flushes the session.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use subtle::ConstantTimeEq;
use tower_sessions::Session;

use super::session::CSRF_TOKEN_KEY;
use crate::error::AppResult;

/// Form field carrying the token in urlencoded submissions.
pub const CSRF_FORM_FIELD: &str = "_csrf";

/// Request header carrying the token (used by HTMX requests).
pub const CSRF_HEADER: &str = "x-csrf-token";

/// CSRF token string (base64url-encoded 32-byte random value).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// Generate a new cryptographically secure token.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a submitted value.
    #[must_use]
    pub fn matches(&self, submitted: &str) -> bool {
        self.0.as_bytes().ct_eq(submitted.as_bytes()).into()
    }
}

impl std::fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Return the session's token, creating and storing one if absent.
pub async fn ensure_token(session: &Session) -> AppResult<CsrfToken> {
    if let Some(existing) = session.get::<String>(CSRF_TOKEN_KEY).await? {
        return Ok(CsrfToken(existing));
    }

    let token = CsrfToken::generate();
    session.insert(CSRF_TOKEN_KEY, token.as_str()).await?;
    Ok(token)
}

/// The session's current token without creating one.
pub async fn current_token(session: &Session) -> AppResult<Option<CsrfToken>> {
    Ok(session.get::<String>(CSRF_TOKEN_KEY).await?.map(CsrfToken))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::session::SessionBackend;

    #[test]
    fn test_generate_shape() {
        let token = CsrfToken::generate();
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(token.as_str().len(), 43);
        assert!(!token.as_str().contains('='));
        assert!(!token.as_str().contains('+'));
        assert_ne!(token, CsrfToken::generate());
    }

    #[test]
    fn test_matches() {
        let token = CsrfToken::generate();
        let copy = token.as_str().to_string();

        assert!(token.matches(&copy));
        assert!(!token.matches(""));
        assert!(!token.matches(&copy[..10]));
        assert!(!token.matches("wrong"));
    }

    #[tokio::test]
    async fn test_ensure_token_is_stable_per_session() {
        let session = Session::new(None, Arc::new(SessionBackend::memory()), None);
        assert!(current_token(&session).await.unwrap().is_none());

        let first = ensure_token(&session).await.unwrap();
        let second = ensure_token(&session).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(current_token(&session).await.unwrap(), Some(first));
    }
}
