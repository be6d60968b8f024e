use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const OUTPUT_DIR: &str = "_bmad-output";
pub const STATUS_FILE: &str = "_bmad-output/implementation-artifacts/sprint-status.yaml";
pub const STATE_FILE: &str = ".bmad-state.json";

pub const CONFIG_FILE: &str = "config/workflows.yaml";
pub const CONFIG_FILE_FALLBACK: &str = "workflows.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn status_path(root: &Path) -> PathBuf {
    root.join(STATUS_FILE)
}

pub fn state_path(root: &Path) -> PathBuf {
    root.join(STATE_FILE)
}

/// Candidate config files in lookup order.
pub fn config_candidates(root: &Path) -> [PathBuf; 2] {
    [root.join(CONFIG_FILE), root.join(CONFIG_FILE_FALLBACK)]
}
