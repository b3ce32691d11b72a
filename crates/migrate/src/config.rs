//! Migration configuration
//!
//! Defaults can be overridden from the environment:
//!
//! | Variable             | Default      |
//! |----------------------|--------------|
//! | `MIGRATE_DIR`        | `migrations` |
//! | `MIGRATE_STATE_FILE` | `.migrate`   |
//! | `MIGRATE_EXTENSION`  | `sql`        |
//! | `MIGRATE_SHELL`      | `sh -e`      |
//!
//! Setting `MIGRATE_STATE_FILE` to an empty string disables persistence.

use std::env;
use std::path::PathBuf;

use crate::error::{MigrateError, MigrateResult};

/// Configuration for loading and running a migration directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// File the cursor is persisted to; `None` keeps it in memory only
    pub state_file: Option<PathBuf>,
    /// Extension of migration files, without the leading dot
    pub extension: String,
    /// Command line scripts are piped into
    pub shell: String,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            state_file: Some(PathBuf::from(".migrate")),
            extension: "sql".to_string(),
            shell: "sh -e".to_string(),
        }
    }
}

impl MigrateConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> MigrateResult<Self> {
        let defaults = Self::default();

        let migrations_dir = env::var("MIGRATE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.migrations_dir);
        let state_file = match env::var("MIGRATE_STATE_FILE") {
            Ok(value) if value.trim().is_empty() => None,
            Ok(value) => Some(PathBuf::from(value)),
            Err(_) => defaults.state_file,
        };
        let extension = env::var("MIGRATE_EXTENSION").unwrap_or(defaults.extension);
        let shell = env::var("MIGRATE_SHELL").unwrap_or(defaults.shell);

        let config = Self {
            migrations_dir,
            state_file,
            extension: extension.trim_start_matches('.').to_string(),
            shell,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    pub fn with_state_file(mut self, path: Option<PathBuf>) -> Self {
        self.state_file = path;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> MigrateResult<()> {
        if self.migrations_dir.as_os_str().is_empty() {
            return Err(MigrateError::invalid_config(
                "migrations_dir",
                "Migrations directory cannot be empty",
            ));
        }

        if self.extension.is_empty()
            || !self
                .extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
        {
            return Err(MigrateError::invalid_config(
                "extension",
                format!("'{}' is not a valid file extension", self.extension),
            ));
        }

        if self.shell.trim().is_empty() {
            return Err(MigrateError::invalid_config("shell", "Shell command cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clean_env() {
        env::remove_var("MIGRATE_DIR");
        env::remove_var("MIGRATE_STATE_FILE");
        env::remove_var("MIGRATE_EXTENSION");
        env::remove_var("MIGRATE_SHELL");
    }

    #[test]
    #[serial]
    fn test_defaults_from_env() {
        clean_env();

        let config = MigrateConfig::from_env().unwrap();
        assert_eq!(config, MigrateConfig::default());
    }

    #[test]
    #[serial]
    fn test_overrides_from_env() {
        clean_env();
        env::set_var("MIGRATE_DIR", "db/migrations");
        env::set_var("MIGRATE_STATE_FILE", "");
        env::set_var("MIGRATE_EXTENSION", ".sh");
        env::set_var("MIGRATE_SHELL", "bash -e");

        let config = MigrateConfig::from_env().unwrap();
        assert_eq!(config.migrations_dir, PathBuf::from("db/migrations"));
        assert_eq!(config.state_file, None);
        assert_eq!(config.extension, "sh");
        assert_eq!(config.shell, "bash -e");

        clean_env();
    }

    #[test]
    #[serial]
    fn test_invalid_extension_rejected() {
        clean_env();
        env::set_var("MIGRATE_EXTENSION", "s q l");

        let err = MigrateConfig::from_env().unwrap_err();
        assert!(matches!(err, MigrateError::InvalidConfig { ref field, .. } if field == "extension"));

        clean_env();
    }

    #[test]
    fn test_validate_shell() {
        let config = MigrateConfig::default().with_shell("  ");
        assert!(config.validate().is_err());
    }
}
