//! Path utilities for locating sample scenario files.

use std::path::PathBuf;

/// Returns the workspace root directory.
///
/// This is determined by walking up from the test-utils manifest directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Returns the directory holding the sample scenario YAML files.
pub fn scenarios_dir() -> PathBuf {
    workspace_root().join("scenarios")
}

/// Returns the path of a sample scenario, e.g. `scenario_path("create_user.yaml")`.
pub fn scenario_path(name: &str) -> PathBuf {
    scenarios_dir().join(name)
}
