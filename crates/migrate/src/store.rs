//! Cursor persistence
//!
//! A [`StateStore`] durably holds the name of the last applied migration so a
//! later process can resume where the previous one stopped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by state store backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt state: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persisted form of a set's cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    /// Name of the last applied migration, `None` when nothing is applied
    pub pos: Option<String>,
    /// When the cursor was last written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CursorState {
    /// State pointing at the given migration, stamped with the current time
    pub fn at(pos: Option<String>) -> Self {
        Self {
            pos,
            updated_at: Some(Utc::now()),
        }
    }

    /// State with nothing applied
    pub fn unapplied() -> Self {
        Self {
            pos: None,
            updated_at: None,
        }
    }
}

/// Durable storage for a [`CursorState`]
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the stored cursor; `Ok(None)` when nothing was stored yet
    async fn load(&self) -> StoreResult<Option<CursorState>>;

    /// Durably replace the stored cursor
    async fn save(&self, state: &CursorState) -> StoreResult<()>;

    /// Human-readable location used in logs and errors
    fn location(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_state_json_shape() {
        let state = CursorState::unapplied();
        assert_eq!(serde_json::to_string(&state).unwrap(), r#"{"pos":null}"#);

        let parsed: CursorState = serde_json::from_str(r#"{"pos":"002-b"}"#).unwrap();
        assert_eq!(parsed.pos.as_deref(), Some("002-b"));
        assert!(parsed.updated_at.is_none());

        let stamped = CursorState::at(Some("001-a".to_string()));
        let json = serde_json::to_value(&stamped).unwrap();
        assert_eq!(json["pos"], "001-a");
        assert!(json["updated_at"].is_string());
    }

    #[test]
    fn test_cursor_state_ignores_unknown_fields() {
        let parsed: CursorState =
            serde_json::from_str(r#"{"pos":"001-a","migrations":[{"title":"001-a"}]}"#).unwrap();
        assert_eq!(parsed.pos.as_deref(), Some("001-a"));
    }
}
