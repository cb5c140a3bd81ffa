//! Stepwise migration runner.
//!
//! `sqlx::migrate::Migrator::run` only knows "apply everything", so the
//! `up`, `down` and `step` commands drive the [`Migrate`] connection API
//! directly, one migration per call, under the migrator's advisory lock.

use std::collections::HashMap;

use sqlx::PgPool;
use sqlx::migrate::{Migrate, MigrateError, Migration};
use tracing::info;

use super::MIGRATOR;
use crate::error::AppResult;

/// What a `migrate` invocation should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPlan {
    /// Apply every pending migration.
    Up,
    /// Revert every applied migration.
    Down,
    /// Apply `n` pending migrations, or revert `-n` applied ones.
    Step(i64),
}

/// Run a migration plan and return how many migrations were applied or reverted.
///
/// # Errors
///
/// Fails if the database is left dirty by an earlier failed migration, if an
/// applied migration no longer matches its embedded checksum, or on any SQL error.
pub async fn run_migrations(pool: &PgPool, plan: MigrationPlan) -> AppResult<usize> {
    let mut conn = pool.acquire().await?;
    let conn = &mut *conn;

    conn.lock().await?;
    let result = execute_plan(conn, plan).await;
    conn.unlock().await?;

    result
}

async fn execute_plan(conn: &mut sqlx::PgConnection, plan: MigrationPlan) -> AppResult<usize> {
    conn.ensure_migrations_table().await?;

    if let Some(version) = conn.dirty_version().await? {
        return Err(MigrateError::Dirty(version).into());
    }

    let applied: HashMap<i64, Vec<u8>> = conn
        .list_applied_migrations()
        .await?
        .into_iter()
        .map(|m| (m.version, m.checksum.into_owned()))
        .collect();

    let (up_limit, down_limit) = match plan {
        MigrationPlan::Up => (usize::MAX, 0),
        MigrationPlan::Down => (0, usize::MAX),
        MigrationPlan::Step(n) if n >= 0 => (usize::try_from(n).unwrap_or(usize::MAX), 0),
        MigrationPlan::Step(n) => (0, usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX)),
    };

    let mut changed = 0;

    if up_limit > 0 {
        for migration in pending_up(&applied)?.into_iter().take(up_limit) {
            let elapsed = conn.apply(migration).await?;
            info!(
                version = migration.version,
                description = %migration.description,
                elapsed_ms = elapsed.as_millis() as u64,
                "Applied migration"
            );
            changed += 1;
        }
    }

    if down_limit > 0 {
        for migration in applied_down(&applied).into_iter().take(down_limit) {
            let elapsed = conn.revert(migration).await?;
            info!(
                version = migration.version,
                description = %migration.description,
                elapsed_ms = elapsed.as_millis() as u64,
                "Reverted migration"
            );
            changed += 1;
        }
    }

    Ok(changed)
}

/// Up migrations not yet applied, oldest first.
fn pending_up(applied: &HashMap<i64, Vec<u8>>) -> Result<Vec<&'static Migration>, MigrateError> {
    let mut pending = Vec::new();

    for migration in MIGRATOR.iter().filter(|m| !m.migration_type.is_down_migration()) {
        match applied.get(&migration.version) {
            Some(checksum) if *checksum != *migration.checksum => {
                return Err(MigrateError::VersionMismatch(migration.version));
            }
            Some(_) => {}
            None => pending.push(migration),
        }
    }

    pending.sort_by_key(|m| m.version);
    Ok(pending)
}

/// Down migrations for applied versions, newest first.
fn applied_down(applied: &HashMap<i64, Vec<u8>>) -> Vec<&'static Migration> {
    let mut down: Vec<&'static Migration> = MIGRATOR
        .iter()
        .filter(|m| m.migration_type.is_down_migration() && applied.contains_key(&m.version))
        .collect();

    down.sort_by_key(|m| std::cmp::Reverse(m.version));
    down
}
