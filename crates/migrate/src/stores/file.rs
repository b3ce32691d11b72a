//! JSON file state store

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::store::{CursorState, StateStore, StoreResult};

/// State store backed by a JSON file such as `.migrate`
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the state is staged in before being renamed into place
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("state"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Directory entry the rename lands in
    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

/// Write `contents` to `path` and flush it to disk before returning
async fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

/// Persist the directory entry so a completed rename survives a crash
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[async_trait]
impl StateStore for FileStore {
    async fn load(&self) -> StoreResult<Option<CursorState>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state = serde_json::from_str(&contents)?;
        Ok(Some(state))
    }

    async fn save(&self, state: &CursorState) -> StoreResult<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(dir).await?;

        let json = serde_json::to_string_pretty(state)?;
        let staging = self.staging_path();
        write_synced(&staging, json.as_bytes()).await?;
        fs::rename(&staging, &self.path).await?;
        sync_dir(dir).await?;

        tracing::debug!(path = %self.path.display(), pos = ?state.pos, "Saved migration state");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
