//! Script migrations - migration files with `-- up` / `-- down` sections
//!
//! ```text
//! -- seed: fixtures/users.csv
//! -- up
//! CREATE TABLE users (id INTEGER PRIMARY KEY);
//! -- down
//! DROP TABLE users;
//! ```
//!
//! Each section becomes one action. The text is handed to a
//! [`ScriptExecutor`], which decides how it reaches the target resource.

use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::discovery::MigrationFile;
use crate::error::{BoxError, MigrateError, MigrateResult};
use crate::set::MigrationSet;
use crate::step::StepAction;

/// Parsed contents of a migration script
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptMigration {
    /// Forward script, `None` when the section is missing or blank
    pub up: Option<String>,
    /// Backward script, `None` when the section is missing or blank
    pub down: Option<String>,
    /// Values from `-- seed:` lines, as a JSON array of strings
    pub seed: Option<Value>,
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Up,
    Down,
}

impl ScriptMigration {
    pub fn parse(content: &str) -> Self {
        let mut up = Vec::new();
        let mut down = Vec::new();
        let mut seeds = Vec::new();
        let mut section = Section::Preamble;

        for line in content.lines() {
            if let Some(comment) = line.trim().strip_prefix("--") {
                let comment = comment.trim();
                let lower = comment.to_lowercase();

                if let Some(marker) = section_marker(&lower) {
                    section = marker;
                    continue;
                }

                if lower.starts_with("seed:") {
                    let value = comment["seed:".len()..].trim();
                    if !value.is_empty() {
                        seeds.push(Value::String(value.to_string()));
                    }
                    continue;
                }
            }

            match section {
                Section::Up => up.push(line),
                Section::Down => down.push(line),
                Section::Preamble => {}
            }
        }

        Self {
            up: non_blank(up),
            down: non_blank(down),
            seed: if seeds.is_empty() {
                None
            } else {
                Some(Value::Array(seeds))
            },
        }
    }

    /// Read and parse a migration file
    pub async fn load(file: &MigrationFile) -> MigrateResult<Self> {
        let content = fs::read_to_string(&file.path).await.map_err(|e| {
            MigrateError::discovery(&file.path, format!("Failed to read migration file: {}", e))
        })?;
        Ok(Self::parse(&content))
    }
}

/// `up` / `down`, optionally followed by `migration`; anything else is an
/// ordinary comment.
fn section_marker(comment: &str) -> Option<Section> {
    let mut words = comment.split_whitespace();
    let section = match words.next()? {
        "up" => Section::Up,
        "down" => Section::Down,
        _ => return None,
    };
    match (words.next(), words.next()) {
        (None, _) | (Some("migration"), None) => Some(section),
        _ => None,
    }
}

fn non_blank(lines: Vec<&str>) -> Option<String> {
    let text = lines.join("\n").trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Runs migration scripts against the target resource
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute(&self, migration: &str, script: &str, seed: Option<&Value>) -> Result<(), BoxError>;
}

/// Executor that pipes each script into an external program's stdin.
///
/// The migration name and seed data (as JSON) are exported to the child as
/// `MIGRATE_NAME` and `MIGRATE_SEED`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    program: String,
    args: Vec<String>,
}

impl ShellExecutor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace separated command line such as `psql -q mydb`
    pub fn from_command_line(command: &str) -> MigrateResult<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| MigrateError::invalid_config("shell", "command must not be empty"))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new("sh", vec!["-e".to_string()])
    }
}

#[async_trait]
impl ScriptExecutor for ShellExecutor {
    async fn execute(&self, migration: &str, script: &str, seed: Option<&Value>) -> Result<(), BoxError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .env("MIGRATE_NAME", migration)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(seed) = seed {
            command.env("MIGRATE_SEED", serde_json::to_string(seed)?);
        }

        let mut child = command.spawn()?;

        // Feed stdin while output is drained, or a chatty script fills its
        // pipes and neither side makes progress.
        let feed = child.stdin.take().map(|mut stdin| {
            let input = format!("{}\n", script);
            tokio::spawn(async move {
                stdin.write_all(input.as_bytes()).await?;
                stdin.shutdown().await
            })
        });

        let output = child.wait_with_output().await?;
        if let Some(feed) = feed {
            match feed.await? {
                Ok(()) => {}
                // The child stopped reading; its exit status below says why.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    tracing::debug!(migration, "Script exited before reading all input");
                }
                Err(e) if output.status.success() => return Err(e.into()),
                Err(e) => {
                    tracing::debug!(migration, error = %e, "Failed to write script input");
                }
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(migration, output = %stdout.trim(), "Script output");
        }

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )
            .into())
        }
    }
}

/// One section of a script migration bound to an executor
pub struct ScriptAction {
    migration: String,
    script: String,
    executor: Arc<dyn ScriptExecutor>,
}

impl ScriptAction {
    pub fn new(migration: impl Into<String>, script: impl Into<String>, executor: Arc<dyn ScriptExecutor>) -> Self {
        Self {
            migration: migration.into(),
            script: script.into(),
            executor,
        }
    }
}

#[async_trait]
impl StepAction for ScriptAction {
    async fn run(&self, seed: Option<&Value>) -> Result<(), BoxError> {
        self.executor.execute(&self.migration, &self.script, seed).await
    }
}

/// Load each file and register it with the set, in the given order
pub async fn register_scripts(
    set: &mut MigrationSet,
    files: &[MigrationFile],
    executor: Arc<dyn ScriptExecutor>,
) -> MigrateResult<()> {
    for file in files {
        let script = ScriptMigration::load(file).await?;
        let bind = |body: Option<String>| -> Option<Arc<dyn StepAction>> {
            body.map(|body| {
                Arc::new(ScriptAction::new(&file.name, body, Arc::clone(&executor))) as Arc<dyn StepAction>
            })
        };

        set.add_migration(&file.name, bind(script.up), bind(script.down), script.seed)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_sections() {
        let content = "-- Migration: add users\n\
                       -- seed: fixtures/users.csv\n\
                       -- Seed: fixtures/roles.csv\n\
                       \n\
                       -- up\n\
                       CREATE TABLE users (id INTEGER);\n\
                       -- index for lookups\n\
                       CREATE INDEX users_id ON users (id);\n\
                       \n\
                       -- Down migration\n\
                       DROP TABLE users;\n";

        let script = ScriptMigration::parse(content);
        assert_eq!(
            script.up.as_deref(),
            Some("CREATE TABLE users (id INTEGER);\n-- index for lookups\nCREATE INDEX users_id ON users (id);")
        );
        assert_eq!(script.down.as_deref(), Some("DROP TABLE users;"));
        assert_eq!(script.seed, Some(json!(["fixtures/users.csv", "fixtures/roles.csv"])));
    }

    #[test]
    fn test_blank_sections_are_absent() {
        let script = ScriptMigration::parse("-- up\necho hi\n-- down\n\n   \n");
        assert_eq!(script.up.as_deref(), Some("echo hi"));
        assert!(script.down.is_none());
        assert!(script.seed.is_none());

        assert_eq!(ScriptMigration::parse("SELECT 1;"), ScriptMigration::default());
    }

    #[test]
    fn test_comments_starting_with_up_or_down_stay_in_section() {
        let content = "-- up\n\
                       -- down-sample rows\n\
                       INSERT INTO samples SELECT * FROM raw;\n\
                       -- up to 10 retries\n\
                       -- Down the line we drop this\n\
                       UPDATE jobs SET retries = 10;\n\
                       -- DOWN\n\
                       -- up next: nothing\n\
                       DELETE FROM samples;\n";

        let script = ScriptMigration::parse(content);
        assert_eq!(
            script.up.as_deref(),
            Some(
                "-- down-sample rows\nINSERT INTO samples SELECT * FROM raw;\n\
                 -- up to 10 retries\n-- Down the line we drop this\nUPDATE jobs SET retries = 10;"
            )
        );
        assert_eq!(script.down.as_deref(), Some("-- up next: nothing\nDELETE FROM samples;"));
    }

    #[test]
    fn test_shell_command_line() {
        let shell = ShellExecutor::from_command_line("psql -q  mydb").unwrap();
        assert_eq!(shell.program(), "psql");
        assert_eq!(shell.args(), &["-q".to_string(), "mydb".to_string()]);
        assert!(ShellExecutor::from_command_line("   ").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_executor_reports_failure() {
        let shell = ShellExecutor::default();
        shell.execute("001-ok", "true", None).await.unwrap();

        let err = shell
            .execute("002-bad", "echo broken >&2; exit 3", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_executor_handles_large_output() {
        let mut script = String::from("head -c 300000 /dev/zero\n");
        for i in 0..10_000 {
            script.push_str(&format!("# filler line {}\n", i));
        }

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ShellExecutor::default().execute("001-chatty", &script, None),
        )
        .await
        .expect("executor stalled on a script with large output");
        result.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_executor_keeps_cause_when_script_exits_early() {
        let mut script = String::from("echo real-cause >&2\nexit 3\n");
        for i in 0..10_000 {
            script.push_str(&format!("# unread line {}\n", i));
        }

        let err = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ShellExecutor::default().execute("002-early-exit", &script, None),
        )
        .await
        .expect("executor stalled on a script that exits early")
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("real-cause"), "{}", message);
        assert!(message.contains("exit"), "{}", message);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shell_executor_exports_seed() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let out = temp_dir.path().join("seed.json");
        let script = format!("printf '%s' \"$MIGRATE_SEED\" > '{}'", out.display());

        ShellExecutor::default()
            .execute("001-seed", &script, Some(&json!(["a.csv"])))
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(out).unwrap(), r#"["a.csv"]"#);
    }
}
