//! JSON file state store

use anyhow::{Context, Result};
use log::debug;
use std::path::{Path, PathBuf};

use super::StateStore;
use crate::models::SyncState;

/// Channel document filename in the config directory
const STATE_FILE: &str = "channels.json";

/// Stores the channel document as pretty-printed JSON
///
/// Writes go to a temp file that is renamed over the document, so a crash
/// mid-save leaves the previous document intact.
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store at ~/.config/photomirror/channels.json, creating the directory
    pub fn open_default() -> Result<Self> {
        let dir = config::init()?;
        Ok(Self::new(dir.join(STATE_FILE)))
    }

    pub fn default_path() -> Result<PathBuf> {
        config::config_path(STATE_FILE).context("Could not determine config directory")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<SyncState> {
        if !self.path.exists() {
            debug!("[STORE] No channel document at {}", self.path.display());
            return Ok(SyncState::new());
        }
        config::load_json_file(&self.path)
    }

    fn replace(&self, state: &SyncState) -> Result<()> {
        config::save_json_file(&self.path, state)
            .with_context(|| format!("Failed to save channel document: {}", self.path.display()))?;
        debug!("[STORE] Saved {} channels", state.len());
        Ok(())
    }
}
