//! Stable device identity
//!
//! A per-installation identifier attached to every event's context. The
//! id is generated once, persisted under the local data directory, and
//! reused by every later kernel session on the same machine.

use std::path::{Path, PathBuf};

use qulab_core::domain::DeviceId;

/// Default location of the persisted device id.
///
/// Typically `~/.local/share/qulab/device_id` on Linux.
pub fn default_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("qulab")
        .join("device_id")
}

/// Reads the persisted device id, creating and persisting a fresh one
/// when the file is missing or unreadable as a UUID.
pub fn load_or_create(path: &Path) -> anyhow::Result<DeviceId> {
    if let Ok(content) = std::fs::read_to_string(path) {
        if let Ok(id) = content.parse::<DeviceId>() {
            return Ok(id);
        }
    }

    let id = DeviceId::new();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, id.to_string())?;
    Ok(id)
}
