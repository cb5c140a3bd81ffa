use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::{NewUser, User, UserStore};
use crate::error::{AppError, AppResult};
use crate::validation::normalize_email;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

const USER_COLUMNS: &str =
    "id, email, hashed_password, first_name, last_name, is_active, created_at, updated_at";

/// [`UserStore`] backed by the `auth_user` table.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip(self))]
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM auth_user WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM auth_user WHERE email = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create(&self, user: NewUser) -> AppResult<User> {
        let email = normalize_email(&user.email);

        let result = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO auth_user (id, email, hashed_password, first_name, last_name) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&user.hashed_password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(created) => Ok(created),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Err(AppError::Conflict(format!("User '{email}' already exists")))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, hashed_password))]
    async fn set_password_by_email(&self, email: &str, hashed_password: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE auth_user SET hashed_password = $2, updated_at = NOW() WHERE email = $1",
        )
        .bind(normalize_email(email))
        .bind(hashed_password)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
