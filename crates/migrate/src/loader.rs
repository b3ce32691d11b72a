//! Building a set from a migrations directory and a state file

use std::sync::Arc;

use crate::config::MigrateConfig;
use crate::discovery::discover_migrations;
use crate::error::MigrateResult;
use crate::script::{register_scripts, ScriptExecutor, ShellExecutor};
use crate::set::MigrationSet;
use crate::stores::FileStore;

impl MigrationSet {
    /// Discover and register the configured migrations, attach the state
    /// file and restore the cursor from it when one was saved before.
    pub async fn load(config: &MigrateConfig, executor: Arc<dyn ScriptExecutor>) -> MigrateResult<Self> {
        config.validate()?;

        let files = discover_migrations(&config.migrations_dir, &config.extension).await?;
        let mut set = MigrationSet::new();
        register_scripts(&mut set, &files, executor).await?;

        if let Some(state_file) = &config.state_file {
            set.set_store(FileStore::new(state_file));
            if set.restore_from_store().await? {
                tracing::info!(
                    state_file = %state_file.display(),
                    position = ?set.current_position(),
                    "Restored migration state"
                );
            }
        }

        Ok(set)
    }

    /// [`MigrationSet::load`] running scripts through the configured shell
    pub async fn load_with_shell(config: &MigrateConfig) -> MigrateResult<Self> {
        let executor = ShellExecutor::from_command_line(&config.shell)?;
        Self::load(config, Arc::new(executor)).await
    }
}
