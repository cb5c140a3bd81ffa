//! User storage.
//!
//! Handlers and middleware only see the [`UserStore`] trait, so the same
//! router runs against PostgreSQL in production and against
//! [`MemoryUserStore`] in tests and local development.
//!
//! # Schema
//!
//! Migrations are embedded from `./migrations` and are reversible, which is
//! what `portico migrate down` and `portico migrate step -1` rely on.

pub mod memory;
pub mod migrate;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::AppResult;

pub use memory::MemoryUserStore;
pub use migrate::{MigrationPlan, run_migrations};
pub use postgres::PgUserStore;

/// Embedded migrations for the `auth_user` schema.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// A row of the `auth_user` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Name shown in the page header.
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }

    /// Initials for the avatar button, falling back to the email's first letter.
    pub fn initials(&self) -> String {
        let initials: String = [&self.first_name, &self.last_name]
            .iter()
            .filter_map(|part| part.chars().next())
            .flat_map(char::to_uppercase)
            .collect();

        if initials.is_empty() {
            self.email
                .chars()
                .next()
                .map(|c| c.to_uppercase().collect())
                .unwrap_or_default()
        } else {
            initials
        }
    }
}

/// Input for [`UserStore::create`]. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Operations on user accounts.
///
/// Emails are compared in lowercase by every implementation.
#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>>;

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Insert a new active user.
    ///
    /// # Errors
    ///
    /// `AppError::Conflict` if the email is already registered.
    async fn create(&self, user: NewUser) -> AppResult<User>;

    /// Replace the password hash of the user with this email.
    ///
    /// Returns `false` when no such user exists.
    async fn set_password_by_email(&self, email: &str, hashed_password: &str) -> AppResult<bool>;

    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> AppResult<()>;
}

/// Open a connection pool from the `[database]` section.
///
/// The pool connects lazily, so this succeeds even while the database is
/// still starting; the first query (or `/ready`) reports the failure.
pub fn connect_pool(config: &DatabaseConfig) -> PgPool {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect_lazy_with(config.connect_options())
}
