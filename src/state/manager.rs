//! State manager implementation
//!
//! Provides file-based state persistence with atomic writes.

use super::types::State;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Shared bookmark store.
///
/// Clones share the same state, so every profile worker advances bookmarks in
/// one place. Nothing is written to disk until `checkpoint` is called;
/// checkpoints from concurrent workers are written one at a time.
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Path to the state file (empty for in-memory mode)
    path: PathBuf,
    /// Current state
    state: Arc<RwLock<State>>,
    /// Held across the temp write and the rename
    write_lock: Arc<Mutex<()>>,
}

impl StateManager {
    /// Create a state manager writing to `path`, starting empty
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Arc::new(RwLock::new(State::new())),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self::new(PathBuf::new())
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            parse_state(&contents)?
        } else {
            State::new()
        };

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(state)),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Create an in-memory state manager from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self {
            path: PathBuf::new(),
            state: Arc::new(RwLock::new(parse_state(json)?)),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Get a snapshot of the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Export state as JSON value
    pub async fn to_json(&self) -> serde_json::Value {
        let state = self.state.read().await;
        serde_json::to_value(&*state).unwrap_or_default()
    }

    /// Get the replication cursor of one stream for one profile
    pub async fn cursor(&self, stream: &str, profile_id: &str) -> Option<String> {
        let state = self.state.read().await;
        state.cursor(stream, profile_id).map(ToString::to_string)
    }

    /// Advance the replication cursor; older values are ignored
    pub async fn advance_cursor(&self, stream: &str, profile_id: &str, value: &str) -> bool {
        let mut state = self.state.write().await;
        let advanced = state.bookmark_mut(stream, profile_id).advance_cursor(value);
        if advanced {
            debug!(stream, profile_id, cursor = value, "Bookmark advanced");
        }
        advanced
    }

    /// Record a completed full-table pass
    pub async fn mark_synced(&self, stream: &str, profile_id: &str, at: DateTime<Utc>) -> bool {
        let mut state = self.state.write().await;
        state.bookmark_mut(stream, profile_id).mark_synced(at)
    }

    /// Persist the current state (temp file + rename)
    pub async fn checkpoint(&self) -> Result<()> {
        if self.is_in_memory() {
            return Ok(());
        }

        // Snapshot under the lock so the last rename carries the newest state
        let _guard = self.write_lock.lock().await;
        let contents = {
            let state = self.state.read().await;
            serde_json::to_string_pretty(&*state)
                .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))?
        };

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::state(format!("Failed to write state file: {e}")))?;

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::state(format!("Failed to rename state file: {e}")))?;

        debug!(path = %self.path.display(), "State checkpointed");
        Ok(())
    }

    /// Get the state file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if using in-memory mode
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str().is_empty()
    }
}

fn parse_state(contents: &str) -> Result<State> {
    if contents.trim().is_empty() {
        return Ok(State::new());
    }
    serde_json::from_str(contents)
        .map_err(|e| Error::state(format!("Failed to parse state: {e}")))
}
