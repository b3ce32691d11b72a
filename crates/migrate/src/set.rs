//! Migration Set - ordered steps plus a durable cursor
//!
//! The set owns the registered steps and the position of the last applied
//! one. [`MigrationSet::run`] moves that position towards a target, running
//! one step at a time and saving the cursor after every step, so a crash
//! mid-run leaves a cursor the next process can resume from.

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{MigrateError, MigrateResult};
use crate::step::{split_migration, Direction, Migration, MigrationStep, StepAction};
use crate::store::{CursorState, StateStore};

/// Point in the sequence a run moves towards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Before the first migration; nothing applied
    Start,
    /// The last registered migration
    End,
    /// A migration by name
    Named(String),
}

impl Target {
    pub fn named(name: impl Into<String>) -> Self {
        Target::Named(name.into())
    }

    /// Far end of the sequence in the given direction
    pub fn default_for(direction: Direction) -> Self {
        match direction {
            Direction::Up => Target::End,
            Direction::Down => Target::Start,
        }
    }
}

/// Result of a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub direction: Direction,
    /// Names of the migrations whose action ran, in execution order
    pub executed: Vec<String>,
    /// Cursor after the run, `None` when nothing is applied
    pub position: Option<String>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl RunReport {
    pub fn is_noop(&self) -> bool {
        self.executed.is_empty()
    }
}

/// Applied state of one registered migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatus {
    pub name: String,
    pub applied: bool,
}

/// Ordered migration steps and the cursor over them
#[derive(Default)]
pub struct MigrationSet {
    steps: Vec<MigrationStep>,
    /// Index of the last applied step, `None` for nothing applied
    position: Option<usize>,
    store: Option<Box<dyn StateStore>>,
    /// Name from a failed restore; runs are refused while set
    rejected_cursor: Option<String>,
}

impl MigrationSet {
    /// Create an empty set without persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty set that saves its cursor to `store`
    pub fn with_store(store: impl StateStore + 'static) -> Self {
        let mut set = Self::new();
        set.set_store(store);
        set
    }

    pub fn set_store(&mut self, store: impl StateStore + 'static) {
        self.store = Some(Box::new(store));
    }

    pub fn store(&self) -> Option<&dyn StateStore> {
        self.store.as_deref()
    }

    /// Register a step from its parts
    pub fn add_migration(
        &mut self,
        name: impl Into<String>,
        up: Option<Arc<dyn StepAction>>,
        down: Option<Arc<dyn StepAction>>,
        seed_data: Option<Value>,
    ) -> MigrateResult<()> {
        self.add_step(MigrationStep::new(name, up, down, seed_data))
    }

    /// Register a migration providing both directions
    pub fn add(
        &mut self,
        name: impl Into<String>,
        migration: Arc<dyn Migration>,
        seed_data: Option<Value>,
    ) -> MigrateResult<()> {
        let (up, down) = split_migration(migration);
        self.add_migration(name, Some(up), Some(down), seed_data)
    }

    pub fn add_step(&mut self, step: MigrationStep) -> MigrateResult<()> {
        if self.index_of(step.name()).is_some() {
            return Err(MigrateError::DuplicateName {
                name: step.name().to_string(),
            });
        }

        tracing::trace!(migration = step.name(), "Registered migration");
        self.steps.push(step);
        Ok(())
    }

    /// Set the cursor from previously persisted state.
    ///
    /// A name that is not registered leaves the set refusing to run until a
    /// valid state is restored.
    pub fn restore_position(&mut self, state: &CursorState) -> MigrateResult<()> {
        let position = match &state.pos {
            None => None,
            Some(name) => match self.index_of(name) {
                Some(index) => Some(index),
                None => {
                    self.rejected_cursor = Some(name.clone());
                    return Err(MigrateError::UnknownCursor { name: name.clone() });
                }
            },
        };

        self.position = position;
        self.rejected_cursor = None;
        tracing::debug!(position = ?state.pos, "Restored migration cursor");
        Ok(())
    }

    /// Load the cursor from the attached store, if any.
    ///
    /// Returns `true` when a stored cursor was found and restored.
    pub async fn restore_from_store(&mut self) -> MigrateResult<bool> {
        let Some(store) = self.store.as_deref() else {
            return Ok(false);
        };

        let state = store.load().await.map_err(|source| MigrateError::StateLoad {
            location: store.location(),
            source,
        })?;

        match state {
            Some(state) => {
                self.restore_position(&state)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Name of the last applied migration, `None` when nothing is applied
    pub fn current_position(&self) -> Option<&str> {
        self.position.map(|index| self.steps[index].name())
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every registered migration with its applied flag, in order
    pub fn status(&self) -> Vec<StepStatus> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| StepStatus {
                name: step.name().to_string(),
                applied: self.position.map_or(false, |pos| index <= pos),
            })
            .collect()
    }

    /// Migrations not yet applied, in order
    pub fn pending(&self) -> Vec<&str> {
        let first = self.position.map_or(0, |pos| pos + 1);
        self.steps[first..].iter().map(|step| step.name()).collect()
    }

    /// Apply migrations up to and including `target`
    pub async fn up(&mut self, target: Target) -> MigrateResult<RunReport> {
        self.run(Direction::Up, target).await
    }

    /// Revert migrations until `target` is the last applied one
    pub async fn down(&mut self, target: Target) -> MigrateResult<RunReport> {
        self.run(Direction::Down, target).await
    }

    /// Move the cursor towards `target`, one step at a time.
    ///
    /// A target already reached, or lying behind the cursor for the requested
    /// direction, runs nothing. The cursor is saved after every step; on
    /// failure the run stops and the error carries the cursor reached so far.
    pub async fn run(&mut self, direction: Direction, target: Target) -> MigrateResult<RunReport> {
        let start_time = Instant::now();
        let plan = self.plan(direction, &target)?;

        if plan.is_empty() {
            tracing::debug!(%direction, ?target, position = ?self.current_position(), "Nothing to migrate");
        }

        let mut executed = Vec::with_capacity(plan.len());
        for index in plan {
            let step = self.steps[index].clone();
            // plan() verified every step in range has an action
            let Some(action) = step.action(direction) else {
                return Err(MigrateError::MissingAction {
                    name: step.name().to_string(),
                    direction,
                });
            };

            tracing::debug!(migration = step.name(), %direction, "Running migration");
            if let Err(source) = action.run(step.seed_data()).await {
                tracing::warn!(migration = step.name(), %direction, error = %source, "Migration failed");
                return Err(MigrateError::StepFailed {
                    step: step.name().to_string(),
                    direction,
                    position: self.current_position().map(str::to_string),
                    source,
                });
            }

            self.position = match direction {
                Direction::Up => Some(index),
                Direction::Down => index.checked_sub(1),
            };
            self.persist(step.name()).await?;

            match direction {
                Direction::Up => tracing::info!(migration = step.name(), "Applied migration"),
                Direction::Down => tracing::info!(migration = step.name(), "Reverted migration"),
            }
            executed.push(step.name().to_string());
        }

        Ok(RunReport {
            direction,
            executed,
            position: self.current_position().map(str::to_string),
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Indices to run, in execution order. Fails without side effects on any
    /// configuration problem.
    fn plan(&self, direction: Direction, target: &Target) -> MigrateResult<Vec<usize>> {
        if let Some(name) = &self.rejected_cursor {
            return Err(MigrateError::CursorNotRestored { name: name.clone() });
        }
        if self.steps.is_empty() {
            return Err(MigrateError::NoSteps);
        }

        let target = match target {
            Target::Start => None,
            Target::End => Some(self.steps.len() - 1),
            Target::Named(name) => Some(
                self.index_of(name)
                    .ok_or_else(|| MigrateError::UnknownTarget { name: name.clone() })?,
            ),
        };

        let plan: Vec<usize> = match direction {
            Direction::Up => {
                let first = self.position.map_or(0, |pos| pos + 1);
                match target {
                    Some(last) if last >= first => (first..=last).collect(),
                    _ => Vec::new(),
                }
            }
            Direction::Down => match self.position {
                None => Vec::new(),
                Some(pos) => {
                    let stop = target.map_or(0, |t| t + 1);
                    if stop > pos {
                        Vec::new()
                    } else {
                        (stop..=pos).rev().collect()
                    }
                }
            },
        };

        if let Some(missing) = plan
            .iter()
            .map(|&index| &self.steps[index])
            .find(|step| step.action(direction).is_none())
        {
            return Err(MigrateError::MissingAction {
                name: missing.name().to_string(),
                direction,
            });
        }

        Ok(plan)
    }

    async fn persist(&self, step: &str) -> MigrateResult<()> {
        let Some(store) = self.store.as_deref() else {
            return Ok(());
        };

        let position = self.current_position().map(str::to_string);
        let state = CursorState::at(position.clone());
        store.save(&state).await.map_err(|source| {
            tracing::warn!(migration = step, location = %store.location(), error = %source, "Failed to save migration cursor");
            MigrateError::StateSave {
                step: step.to_string(),
                position,
                location: store.location(),
                source,
            }
        })
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name() == name)
    }
}

impl std::fmt::Debug for MigrationSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationSet")
            .field("steps", &self.steps)
            .field("position", &self.current_position())
            .field("store", &self.store.as_ref().map(|s| s.location()))
            .finish()
    }
}
