use tracing::info;

use super::{CliResult, MigrateCommand, OrExit};
use crate::config::Config;
use crate::db::{MigrationPlan, connect_pool, run_migrations};

impl From<MigrateCommand> for MigrationPlan {
    fn from(command: MigrateCommand) -> Self {
        match command {
            MigrateCommand::Up => MigrationPlan::Up,
            MigrateCommand::Down => MigrationPlan::Down,
            MigrateCommand::Step { n } => MigrationPlan::Step(n),
        }
    }
}

pub(super) async fn migrate(config: &Config, command: MigrateCommand) -> CliResult {
    let pool = connect_pool(&config.database);
    info!(database = %config.database.display_target(), ?command, "Running migrations");

    let changed = run_migrations(&pool, command.into())
        .await
        .or_exit(exitcode::TEMPFAIL, "migration failed")?;
    pool.close().await;

    if changed == 0 {
        println!("No migrations to apply");
    } else {
        println!("Migrations applied successfully");
    }
    Ok(())
}
