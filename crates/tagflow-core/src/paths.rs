use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const TAGFLOW_DIR: &str = ".tagflow";
pub const CONFIG_FILE: &str = ".tagflow/config.yaml";
pub const FLEET_FILE: &str = ".tagflow/fleet.yaml";
pub const RUN_LOG_FILE: &str = ".tagflow/runs.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn tagflow_dir(root: &Path) -> PathBuf {
    root.join(TAGFLOW_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn run_log_path(root: &Path) -> PathBuf {
    root.join(RUN_LOG_FILE)
}

/// Whether `root` holds an initialized project.
pub fn is_initialized(root: &Path) -> bool {
    config_path(root).exists()
}
