//! Migration steps - the reversible units of work a set runs
//!
//! A step is a name plus an optional forward and backward action. Actions are
//! anything implementing [`StepAction`]; whole migrations implement the
//! [`Migration`] capability and are split into both actions on registration.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{BoxError, MigrateError};

/// Direction a set is asked to move in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Apply steps, moving the cursor towards the end
    Up,
    /// Revert steps, moving the cursor towards the start
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

impl FromStr for Direction {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            _ => Err(MigrateError::invalid_config(
                "direction",
                format!("expected 'up' or 'down', got '{}'", s),
            )),
        }
    }
}

/// One half of a migration: the code run for a single direction
#[async_trait]
pub trait StepAction: Send + Sync {
    /// Perform the action, receiving the step's seed data if it has any
    async fn run(&self, seed: Option<&Value>) -> Result<(), BoxError>;
}

/// A reversible migration providing both directions
#[async_trait]
pub trait Migration: Send + Sync {
    async fn up(&self, seed: Option<&Value>) -> Result<(), BoxError>;

    async fn down(&self, seed: Option<&Value>) -> Result<(), BoxError>;
}

/// Action backed by an async closure
pub struct FnAction<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> StepAction for FnAction<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BoxError>> + Send,
{
    async fn run(&self, seed: Option<&Value>) -> Result<(), BoxError> {
        (self.f)(seed.cloned()).await
    }
}

/// Wrap an async closure as a shareable step action
pub fn action<F, Fut>(f: F) -> Arc<dyn StepAction>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(FnAction { f })
}

/// One direction of a [`Migration`]
struct MigrationHalf {
    migration: Arc<dyn Migration>,
    direction: Direction,
}

#[async_trait]
impl StepAction for MigrationHalf {
    async fn run(&self, seed: Option<&Value>) -> Result<(), BoxError> {
        match self.direction {
            Direction::Up => self.migration.up(seed).await,
            Direction::Down => self.migration.down(seed).await,
        }
    }
}

/// Split a migration into its `up` and `down` actions
pub fn split_migration(migration: Arc<dyn Migration>) -> (Arc<dyn StepAction>, Arc<dyn StepAction>) {
    let up = Arc::new(MigrationHalf {
        migration: Arc::clone(&migration),
        direction: Direction::Up,
    });
    let down = Arc::new(MigrationHalf {
        migration,
        direction: Direction::Down,
    });
    (up, down)
}

/// Immutable descriptor of a single migration step
#[derive(Clone)]
pub struct MigrationStep {
    name: String,
    up: Option<Arc<dyn StepAction>>,
    down: Option<Arc<dyn StepAction>>,
    seed_data: Option<Value>,
}

impl MigrationStep {
    pub fn new(
        name: impl Into<String>,
        up: Option<Arc<dyn StepAction>>,
        down: Option<Arc<dyn StepAction>>,
        seed_data: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            up,
            down,
            seed_data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn seed_data(&self) -> Option<&Value> {
        self.seed_data.as_ref()
    }

    pub fn up(&self) -> Option<&Arc<dyn StepAction>> {
        self.up.as_ref()
    }

    pub fn down(&self) -> Option<&Arc<dyn StepAction>> {
        self.down.as_ref()
    }

    /// Action for the given direction, if the step has one
    pub fn action(&self, direction: Direction) -> Option<&Arc<dyn StepAction>> {
        match direction {
            Direction::Up => self.up(),
            Direction::Down => self.down(),
        }
    }
}

impl fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStep")
            .field("name", &self.name)
            .field("up", &self.up.is_some())
            .field("down", &self.down.is_some())
            .field("seed_data", &self.seed_data)
            .finish()
    }
}
