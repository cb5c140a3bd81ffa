//! Session cookie layer and the keys stored in a session.
//!
//! The browser only holds an encrypted cookie carrying the session id; the
//! data lives in a [`SessionBackend`], either in process memory or in the
//! `tower_sessions` table of PostgreSQL.

use async_trait::async_trait;
use tower_sessions::cookie::Key;
use tower_sessions::service::PrivateCookie;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, ExpiredDeletion, SessionStore};
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use uuid::Uuid;

use super::memory_store::MemorySessionStore;
use crate::config::SessionConfig;
use crate::error::{AppError, AppResult};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "session";

/// Session key holding the logged-in user's id as 16 raw bytes.
pub const USER_ID_KEY: &str = "user_id";

/// Session key holding the CSRF token.
pub const CSRF_TOKEN_KEY: &str = "csrf_token";

/// Session store selected by `session.store`.
#[derive(Debug, Clone)]
pub enum SessionBackend {
    Memory(MemorySessionStore),
    Postgres(PostgresStore),
}

impl SessionBackend {
    pub fn memory() -> Self {
        Self::Memory(MemorySessionStore::new())
    }

    /// Postgres-backed store; creates its schema and table if missing.
    pub async fn postgres(pool: sqlx::PgPool) -> AppResult<Self> {
        let store = PostgresStore::new(pool);
        store.migrate().await?;
        Ok(Self::Postgres(store))
    }

    /// Delete expired sessions from either store.
    pub async fn delete_expired(&self) -> session_store::Result<()> {
        match self {
            Self::Memory(store) => store.delete_expired().await,
            Self::Postgres(store) => store.delete_expired().await,
        }
    }
}

#[async_trait]
impl SessionStore for SessionBackend {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        match self {
            Self::Memory(store) => store.create(record).await,
            Self::Postgres(store) => store.create(record).await,
        }
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        match self {
            Self::Memory(store) => store.save(record).await,
            Self::Postgres(store) => store.save(record).await,
        }
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        match self {
            Self::Memory(store) => store.load(session_id).await,
            Self::Postgres(store) => store.load(session_id).await,
        }
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        match self {
            Self::Memory(store) => store.delete(session_id).await,
            Self::Postgres(store) => store.delete(session_id).await,
        }
    }
}

/// Build the session layer from the `[session]` section.
///
/// # Errors
///
/// `AppError::ConfigError` if the key is not 64 bytes of hex.
pub fn session_layer(
    config: &SessionConfig,
    backend: SessionBackend,
) -> AppResult<SessionManagerLayer<SessionBackend, PrivateCookie>> {
    let key_bytes = config.key_bytes()?;
    let key = Key::try_from(key_bytes.as_slice())
        .map_err(|e| AppError::ConfigError(format!("Invalid SESSION_KEY: {e}")))?;

    let mut layer = SessionManagerLayer::new(backend)
        .with_name(SESSION_COOKIE)
        .with_path(config.path.clone())
        .with_secure(config.secure)
        .with_http_only(config.http_only)
        .with_same_site(config.same_site.into())
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(config.max_age)));

    if !config.domain.is_empty() {
        layer = layer.with_domain(config.domain.clone());
    }

    Ok(layer.with_private(key))
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Id of the logged-in user, if any.
pub async fn session_user_id(session: &Session) -> AppResult<Option<Uuid>> {
    Ok(session
        .get::<[u8; 16]>(USER_ID_KEY)
        .await?
        .map(Uuid::from_bytes))
}

/// Record a successful login.
///
/// The session id is rotated and the CSRF token dropped, so nothing an
/// attacker planted before login survives it.
pub async fn start_user_session(session: &Session, user_id: Uuid) -> AppResult<()> {
    session.cycle_id().await?;
    session.remove::<String>(CSRF_TOKEN_KEY).await?;
    session.insert(USER_ID_KEY, *user_id.as_bytes()).await?;
    Ok(())
}

/// Forget everything about this client, including the cookie.
pub async fn end_session(session: &Session) -> AppResult<()> {
    session.flush().await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::Config;

    fn test_session() -> Session {
        Session::new(None, Arc::new(SessionBackend::memory()), None)
    }

    #[tokio::test]
    async fn test_user_id_round_trip() {
        let session = test_session();
        assert_eq!(session_user_id(&session).await.unwrap(), None);

        let id = Uuid::new_v4();
        start_user_session(&session, id).await.unwrap();
        assert_eq!(session_user_id(&session).await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_start_user_session_drops_csrf_token() {
        let session = test_session();
        session.insert(CSRF_TOKEN_KEY, "planted").await.unwrap();

        start_user_session(&session, Uuid::new_v4()).await.unwrap();
        assert!(session.get::<String>(CSRF_TOKEN_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_end_session_clears_user() {
        let session = test_session();
        start_user_session(&session, Uuid::new_v4()).await.unwrap();

        end_session(&session).await.unwrap();
        assert_eq!(session_user_id(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_backend_sweeps_expired_sessions() {
        let backend = SessionBackend::memory();
        let stale_expiry = time::OffsetDateTime::now_utc() - time::Duration::hours(1);
        for _ in 0..3 {
            let mut record = Record {
                id: Id::default(),
                data: Default::default(),
                expiry_date: stale_expiry,
            };
            backend.create(&mut record).await.unwrap();
        }

        backend.delete_expired().await.unwrap();

        let SessionBackend::Memory(store) = &backend else {
            panic!("expected the memory backend");
        };
        assert!(store.is_empty());
    }

    #[test]
    fn test_session_layer_rejects_short_key() {
        let mut config = Config::default().session;
        config.key = "00".repeat(32);

        assert!(session_layer(&config, SessionBackend::memory()).is_err());
    }

    #[test]
    fn test_session_layer_accepts_default_config() {
        let config = Config::default().session;
        assert!(session_layer(&config, SessionBackend::memory()).is_ok());
    }
}
