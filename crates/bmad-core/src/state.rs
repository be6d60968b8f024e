use crate::error::{BmadError, Result};
use crate::status::Status;
use crate::{io, paths};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Checkpoint of an in-flight lifecycle run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub story_key: String,
    pub step_index: usize,
    pub total_steps: usize,
    pub start_status: Status,
}

/// Reads and writes `.bmad-state.json` in a working directory.
#[derive(Debug, Clone)]
pub struct StateManager {
    path: PathBuf,
}

impl StateManager {
    pub fn new(root: &Path) -> Self {
        Self {
            path: paths::state_path(root),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, state: &ExecutionState) -> Result<()> {
        let data = serde_json::to_vec_pretty(state)?;
        io::atomic_write(&self.path, &data)?;
        tracing::debug!(
            story = %state.story_key,
            step = state.step_index,
            total = state.total_steps,
            "checkpoint saved"
        );
        Ok(())
    }

    /// The saved checkpoint, or `NoState` when there is none.
    pub fn load(&self) -> Result<ExecutionState> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(BmadError::NoState),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn clear(&self) -> Result<()> {
        io::remove_if_exists(&self.path)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}
