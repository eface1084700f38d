//! In-memory state store

use anyhow::Result;
use std::sync::RwLock;

use super::StateStore;
use crate::models::SyncState;

/// In-memory implementation of StateStore
///
/// Counts saves so tests can check that cycles persist their cursor.
pub struct InMemoryStateStore {
    state: RwLock<SyncState>,
    saves: RwLock<usize>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::with_state(SyncState::new())
    }

    /// Start from an existing document
    pub fn with_state(state: SyncState) -> Self {
        Self {
            state: RwLock::new(state),
            saves: RwLock::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        *self.saves.read().unwrap()
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for InMemoryStateStore {
    fn load(&self) -> Result<SyncState> {
        Ok(self.state.read().unwrap().clone())
    }

    fn replace(&self, state: &SyncState) -> Result<()> {
        *self.state.write().unwrap() = state.clone();
        *self.saves.write().unwrap() += 1;
        Ok(())
    }
}
