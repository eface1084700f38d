//! Storage trait definitions

use crate::models::SyncState;
use anyhow::Result;

/// Trait for the persisted channel document
///
/// The document is always loaded and replaced whole. Implementations do not
/// coordinate with other processes.
pub trait StateStore: Send + Sync {
    /// Load the full document; a missing document is an empty state
    fn load(&self) -> Result<SyncState>;

    /// Replace the full document
    fn replace(&self, state: &SyncState) -> Result<()>;
}
