//! Migration discovery - finding migration files on disk
//!
//! Migration files carry a numeric prefix (`001-add-users.sql`,
//! `20240101120000-add-index.sql`). Discovery lists the files matching
//! `^\d+.*\.<ext>$` and orders them by that number, then by file name.

use chrono::Utc;
use regex::Regex;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MigrateError, MigrateResult};

/// A migration file found in the migrations directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File name, used as the migration name
    pub name: String,
    pub path: PathBuf,
}

/// List migration files in `dir`, in execution order
pub async fn discover_migrations(dir: &Path, extension: &str) -> MigrateResult<Vec<MigrationFile>> {
    let pattern = file_pattern(extension)?;
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| MigrateError::discovery(dir, format!("Failed to read directory: {}", e)))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| MigrateError::discovery(dir, format!("Failed to read directory entry: {}", e)))?
    {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!(path = %entry.path().display(), "Skipping migration file with non UTF-8 name");
            continue;
        };
        if !pattern.is_match(&name) {
            continue;
        }

        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file {
            files.push(MigrationFile {
                path: entry.path(),
                name,
            });
        }
    }

    files.sort_by(|a, b| compare_names(&a.name, &b.name));
    tracing::debug!(dir = %dir.display(), count = files.len(), "Discovered migration files");
    Ok(files)
}

/// Write a new, empty migration file and return its path
pub async fn create_migration(dir: &Path, title: &str, extension: &str) -> MigrateResult<PathBuf> {
    let extension = extension.trim_start_matches('.');
    let slug = slugify(title);
    if slug.is_empty() {
        return Err(MigrateError::invalid_config(
            "title",
            format!("'{}' does not contain any letters or digits", title),
        ));
    }

    fs::create_dir_all(dir)
        .await
        .map_err(|e| MigrateError::discovery(dir, format!("Failed to create directory: {}", e)))?;

    let now = Utc::now();
    let filename = format!("{}-{}.{}", now.format("%Y%m%d%H%M%S"), slug, extension);
    let path = dir.join(&filename);
    let template = format!(
        "-- Migration: {}\n\
         -- Created: {}\n\
         -- Lines of the form `-- seed: <value>` are passed to both actions\n\n\
         -- up\n\n\n\
         -- down\n\n",
        title,
        now.format("%Y-%m-%d %H:%M:%S UTC")
    );

    fs::write(&path, template)
        .await
        .map_err(|e| MigrateError::discovery(dir, format!("Failed to write migration file: {}", e)))?;

    tracing::info!(path = %path.display(), "Created migration");
    Ok(path)
}

fn file_pattern(extension: &str) -> MigrateResult<Regex> {
    let extension = extension.trim_start_matches('.');
    Regex::new(&format!(r"^\d+.*\.{}$", regex::escape(extension)))
        .map_err(|e| MigrateError::invalid_config("extension", e.to_string()))
}

/// Numeric value of the leading digits first, then plain lexical order
fn compare_names(a: &str, b: &str) -> Ordering {
    let (a_num, b_num) = (numeric_prefix(a), numeric_prefix(b));
    a_num
        .len()
        .cmp(&b_num.len())
        .then_with(|| a_num.cmp(b_num))
        .then_with(|| a.cmp(b))
}

/// Leading digits without leading zeros, compared as strings so prefixes of
/// any length order correctly
fn numeric_prefix(name: &str) -> &str {
    let end = name
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(name.len());
    name[..end].trim_start_matches('0')
}

fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    #[test]
    fn test_numeric_then_lexical_order() {
        let mut names = vec!["10-c.sql", "2-b.sql", "002-a.sql", "1-z.sql", "0010-b.sql"];
        names.sort_by(|a, b| compare_names(a, b));
        assert_eq!(names, vec!["1-z.sql", "002-a.sql", "2-b.sql", "0010-b.sql", "10-c.sql"]);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Add users table"), "add-users-table");
        assert_eq!(slugify("  --  "), "");
    }

    #[tokio::test]
    async fn test_discover_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["10-ten.sql", "2-two.sql", "README.md", "notes.sql", "3-three.txt"] {
            stdfs::write(temp_dir.path().join(name), "-- up\n").unwrap();
        }
        stdfs::create_dir(temp_dir.path().join("4-dir.sql")).unwrap();

        let files = discover_migrations(temp_dir.path(), "sql").await.unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["2-two.sql", "10-ten.sql"]);
        assert_eq!(files[0].path, temp_dir.path().join("2-two.sql"));
    }

    #[tokio::test]
    async fn test_discover_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let err = discover_migrations(&temp_dir.path().join("nope"), "sql")
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Discovery { .. }));
    }

    #[tokio::test]
    async fn test_create_migration_is_discoverable() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("migrations");

        let path = create_migration(&dir, "Create users table", ".sql").await.unwrap();
        let filename = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(filename.ends_with("-create-users-table.sql"));

        let content = stdfs::read_to_string(&path).unwrap();
        assert!(content.contains("-- Migration: Create users table"));
        assert!(content.contains("-- up"));
        assert!(content.contains("-- down"));

        let files = discover_migrations(&dir, "sql").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, filename);
    }
}
