//! # migrate-set
//!
//! Ordered, reversible migrations with a durable cursor.
//!
//! A [`MigrationSet`] holds migration steps in registration order and the
//! name of the last applied one. Runs move that cursor up or down one step at
//! a time and save it after every step, so re-running after a failure or a
//! crash resumes where the previous run stopped instead of repeating work.
//!
//! ## Quick Start
//!
//! ```rust
//! use migrate_set::{action, MemoryStore, MigrationSet, Target};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! let mut set = MigrationSet::with_store(store.clone());
//!
//! set.add_migration(
//!     "001-create-users",
//!     Some(action(|_| async { Ok(()) })),
//!     Some(action(|_| async { Ok(()) })),
//!     None,
//! ).unwrap();
//!
//! let report = set.up(Target::End).await.unwrap();
//! assert_eq!(report.executed, vec!["001-create-users"]);
//! assert_eq!(store.snapshot().unwrap().pos.as_deref(), Some("001-create-users"));
//! # });
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod loader;
pub mod script;
pub mod set;
pub mod step;
pub mod store;
pub mod stores;

pub use config::MigrateConfig;
pub use discovery::{create_migration, discover_migrations, MigrationFile};
pub use error::{BoxError, ErrorKind, MigrateError, MigrateResult};
pub use script::{register_scripts, ScriptAction, ScriptExecutor, ScriptMigration, ShellExecutor};
pub use set::{MigrationSet, RunReport, StepStatus, Target};
pub use step::{action, split_migration, Direction, FnAction, Migration, MigrationStep, StepAction};
pub use store::{CursorState, StateStore, StoreError, StoreResult};
pub use stores::*;
