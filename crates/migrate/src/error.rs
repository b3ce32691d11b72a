//! Error types for the migration system
//!
//! Errors fall into three kinds: configuration problems detected before any
//! step runs, failures of a step's own action, and failures loading or saving
//! the cursor.

use std::path::PathBuf;
use thiserror::Error;

use crate::step::Direction;
use crate::store::StoreError;

/// Boxed error returned by step actions and script executors
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Coarse classification of a [`MigrateError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Detected before any step ran; nothing was changed
    Configuration,
    /// A step's `up` or `down` action failed
    StepExecution,
    /// The cursor could not be loaded or saved
    Persistence,
}

/// Error types for migration operations
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("No migrations registered")]
    NoSteps,

    #[error("Duplicate migration name: {name}")]
    DuplicateName { name: String },

    #[error("Stored cursor references unknown migration '{name}'")]
    UnknownCursor { name: String },

    #[error("Migration '{name}' not found")]
    UnknownTarget { name: String },

    #[error("Cursor is unusable after a failed restore of '{name}'; restore a valid position first")]
    CursorNotRestored { name: String },

    #[error("Migration '{name}' has no {direction} action")]
    MissingAction { name: String, direction: Direction },

    #[error("Configuration error: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Failed to read migrations from {}: {message}", .path.display())]
    Discovery { path: PathBuf, message: String },

    #[error("Migration '{step}' failed while running {direction} (cursor at {}): {source}", display_position(.position))]
    StepFailed {
        step: String,
        direction: Direction,
        position: Option<String>,
        source: BoxError,
    },

    #[error("Unable to load migration state from {location}: {source}")]
    StateLoad {
        location: String,
        source: StoreError,
    },

    #[error(
        "Migration '{step}' was applied but cursor '{}' could not be saved to {location}; \
         the stored cursor is stale, do not re-run blindly: {source}",
        display_position(.position)
    )]
    StateSave {
        step: String,
        position: Option<String>,
        location: String,
        source: StoreError,
    },
}

impl MigrateError {
    /// Create a new invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a new discovery error
    pub fn discovery(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Discovery {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StepFailed { .. } => ErrorKind::StepExecution,
            Self::StateLoad { .. } | Self::StateSave { .. } => ErrorKind::Persistence,
            _ => ErrorKind::Configuration,
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Cursor left behind by a run that stopped part-way.
    ///
    /// `None` for errors raised before a run started; `Some(None)` means the
    /// cursor is at the start of the sequence.
    pub fn partial_position(&self) -> Option<Option<&str>> {
        match self {
            Self::StepFailed { position, .. } | Self::StateSave { position, .. } => {
                Some(position.as_deref())
            }
            _ => None,
        }
    }
}

fn display_position(position: &Option<String>) -> &str {
    position.as_deref().unwrap_or("<start>")
}
