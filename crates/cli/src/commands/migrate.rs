use courseplan_core::config::{AppConfig, LoadOptions};
use courseplan_db::{connect_with_config, migrations};

use super::{execute, CommandFailure, CommandResult, CommandSuccess};

pub fn run(options: &LoadOptions) -> CommandResult {
    execute("migrate", options, apply)
}

async fn apply(config: AppConfig) -> Result<CommandSuccess, CommandFailure> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| CommandFailure::db_connectivity(error.to_string()))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| CommandFailure::migration(error.to_string()))?;
    pool.close().await;
    Ok(CommandSuccess::message("applied pending migrations"))
}
