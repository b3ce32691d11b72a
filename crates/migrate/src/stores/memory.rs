//! In-memory state store

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::store::{CursorState, StateStore, StoreResult};

/// State store that keeps the cursor in process memory.
///
/// Clones share the same cursor, so a caller can keep a handle after giving
/// the store to a set.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    state: Option<CursorState>,
    saves: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a cursor
    pub fn with_state(state: CursorState) -> Self {
        let store = Self::new();
        store.inner.lock().state = Some(state);
        store
    }

    /// Currently stored cursor
    pub fn snapshot(&self) -> Option<CursorState> {
        self.inner.lock().state.clone()
    }

    /// Number of successful saves since creation
    pub fn save_count(&self) -> usize {
        self.inner.lock().saves
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> StoreResult<Option<CursorState>> {
        Ok(self.snapshot())
    }

    async fn save(&self, state: &CursorState) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        inner.state = Some(state.clone());
        inner.saves += 1;
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
