//! `createuser` and `setpassword`.

use anyhow::anyhow;
use tracing::info;

use super::{CliResult, Failure, OrExit};
use crate::auth::password::hash_password_blocking;
use crate::config::Config;
use crate::db::{NewUser, PgUserStore, UserStore, connect_pool};
use crate::error::AppError;
use crate::validation::{normalize_email, validate_email, validate_name, validate_password};

/// Validate, hash and insert a user.
pub(super) async fn create_user(
    config: &Config,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
) -> CliResult {
    let email = normalize_email(&email);
    validate_email(&email).or_exit(exitcode::DATAERR, "invalid email")?;
    validate_password(&password).or_exit(exitcode::DATAERR, "invalid password")?;
    validate_name(&first_name, "first name").or_exit(exitcode::DATAERR, "invalid first name")?;
    validate_name(&last_name, "last name").or_exit(exitcode::DATAERR, "invalid last name")?;

    let hashed_password = hash_password_blocking(password)
        .await
        .or_exit(exitcode::SOFTWARE, "could not hash password")?;

    let pool = connect_pool(&config.database);
    let store = PgUserStore::new(pool.clone());
    let result = store
        .create(NewUser {
            email,
            hashed_password,
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
        })
        .await;
    pool.close().await;

    let user = match result {
        Ok(user) => user,
        Err(e @ AppError::Conflict(_)) => return Err(Failure::new(exitcode::DATAERR, e)),
        Err(e) => return Err(Failure::new(exitcode::TEMPFAIL, e)),
    };

    info!(user_id = %user.id, email = %user.email, "User created");
    println!("Created user {} ({})", user.email, user.id);
    Ok(())
}

/// Rehash and store a new password for an existing user.
pub(super) async fn set_password(config: &Config, email: String, password: String) -> CliResult {
    let email = normalize_email(&email);
    validate_email(&email).or_exit(exitcode::DATAERR, "invalid email")?;
    validate_password(&password).or_exit(exitcode::DATAERR, "invalid password")?;

    let hashed_password = hash_password_blocking(password)
        .await
        .or_exit(exitcode::SOFTWARE, "could not hash password")?;

    let pool = connect_pool(&config.database);
    let store = PgUserStore::new(pool.clone());
    let updated = store
        .set_password_by_email(&email, &hashed_password)
        .await;
    pool.close().await;

    if !updated.or_exit(exitcode::TEMPFAIL, "could not update password")? {
        return Err(Failure::new(
            exitcode::NOUSER,
            anyhow!("no user with email {email}"),
        ));
    }

    info!(email = %email, "Password updated");
    println!("Password updated for {email}");
    Ok(())
}
