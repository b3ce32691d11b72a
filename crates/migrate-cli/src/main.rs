mod commands;
mod logging;

use clap::{Parser, Subcommand};
use migrate_set::MigrateConfig;
use std::path::PathBuf;

use logging::{init_logging, LogFormat, LoggingConfig};

#[derive(Parser)]
#[command(name = "migrate")]
#[command(about = "Run ordered, resumable migrations from a directory")]
#[command(version)]
struct Cli {
    /// Directory containing migration files
    #[arg(long, short = 'd', global = true, env = "MIGRATE_DIR")]
    dir: Option<PathBuf>,

    /// File the migration cursor is stored in. Falls back to
    /// `MIGRATE_STATE_FILE`, where an empty value keeps the cursor in memory.
    #[arg(long, short = 's', global = true)]
    state_file: Option<PathBuf>,

    /// Keep the cursor in memory only
    #[arg(long, global = true, conflicts_with = "state_file")]
    no_state: bool,

    /// Command scripts are piped into
    #[arg(long, global = true, env = "MIGRATE_SHELL")]
    shell: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Show debug logs
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply migrations up to and including NAME (default: all)
    Up {
        /// Migration file name to stop at
        name: Option<String>,
    },

    /// Revert migrations until NAME is the last applied one (default: all)
    Down {
        /// Migration file name to stop at; it is not reverted
        name: Option<String>,
    },

    /// Show which migrations are applied
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new migration file
    Create {
        /// Migration title
        #[arg(required = true)]
        title: Vec<String>,
    },
}

impl Cli {
    fn config(&self) -> anyhow::Result<MigrateConfig> {
        let mut config = MigrateConfig::from_env()?;
        if let Some(dir) = &self.dir {
            config = config.with_migrations_dir(dir);
        }
        if self.no_state {
            config = config.with_state_file(None);
        } else if let Some(state_file) = &self.state_file {
            config = config.with_state_file(Some(state_file.clone()));
        }
        if let Some(shell) = &self.shell {
            config = config.with_shell(shell);
        }
        config.validate()?;
        Ok(config)
    }

    fn logging(&self) -> LoggingConfig {
        let base = if self.verbose {
            LoggingConfig::verbose()
        } else if self.quiet {
            LoggingConfig::quiet()
        } else {
            LoggingConfig::default()
        };
        base.with_format(self.log_format)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.logging()).map_err(anyhow::Error::msg)?;
    let config = cli.config()?;

    match cli.command {
        Commands::Up { name } => {
            commands::up(&config, name).await?;
        }
        Commands::Down { name } => {
            commands::down(&config, name).await?;
        }
        Commands::Status { json } => {
            commands::status(&config, json).await?;
        }
        Commands::Create { title } => {
            commands::create(&config, &title.join(" ")).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        env::remove_var("MIGRATE_DIR");
        env::remove_var("MIGRATE_STATE_FILE");
        env::remove_var("MIGRATE_SHELL");
    }

    #[test]
    fn test_parse_up_with_target() {
        let cli = Cli::parse_from(["migrate", "--dir", "db", "up", "002-add-pets.sql"]);
        assert!(matches!(cli.command, Commands::Up { name: Some(ref n) } if n == "002-add-pets.sql"));
        assert_eq!(cli.dir, Some(PathBuf::from("db")));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["migrate", "down", "--no-state", "--log-format", "json"]);
        assert!(matches!(cli.command, Commands::Down { name: None }));
        assert!(cli.no_state);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn test_create_joins_title_words() {
        let cli = Cli::parse_from(["migrate", "create", "add", "users", "table"]);
        match cli.command {
            Commands::Create { title } => assert_eq!(title.join(" "), "add users table"),
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_no_state_conflicts_with_state_file() {
        assert!(Cli::try_parse_from(["migrate", "--no-state", "--state-file", "x", "up"]).is_err());
    }

    #[test]
    fn test_quiet_logs_errors_only() {
        let cli = Cli::parse_from(["migrate", "status", "--quiet"]);
        assert_eq!(cli.logging().level, "error");

        let cli = Cli::parse_from(["migrate", "-q", "up"]);
        assert!(cli.quiet);
        assert_eq!(Cli::parse_from(["migrate", "up"]).logging().level, "info");
        assert!(Cli::try_parse_from(["migrate", "-q", "-v", "up"]).is_err());
    }

    #[test]
    #[serial]
    fn test_flags_fall_back_to_env() {
        clean_env();
        env::set_var("MIGRATE_DIR", "db/migrations");
        env::set_var("MIGRATE_SHELL", "bash -e");

        let cli = Cli::parse_from(["migrate", "up"]);
        assert_eq!(cli.dir, Some(PathBuf::from("db/migrations")));
        assert_eq!(cli.shell.as_deref(), Some("bash -e"));

        let cli = Cli::parse_from(["migrate", "--dir", "other", "up"]);
        assert_eq!(cli.dir, Some(PathBuf::from("other")));

        clean_env();
    }

    #[test]
    #[serial]
    fn test_no_state_overrides_env_state_file() {
        clean_env();
        env::set_var("MIGRATE_STATE_FILE", "custom.state");

        let cli = Cli::parse_from(["migrate", "up"]);
        assert_eq!(cli.state_file, None);
        assert_eq!(
            cli.config().unwrap().state_file,
            Some(PathBuf::from("custom.state"))
        );

        let cli = Cli::parse_from(["migrate", "--no-state", "up"]);
        assert_eq!(cli.config().unwrap().state_file, None);

        clean_env();
    }
}
