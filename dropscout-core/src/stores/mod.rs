// src/stores/mod.rs

pub mod favorites;
pub mod guild_config;
pub mod state;

pub use favorites::FavoritesStore;
pub use guild_config::GuildConfigStore;
pub use state::{Snapshot, SnapshotEntry, SnapshotStore};

use std::fs;
use std::path::Path;

use crate::Error;

/// Write `payload` to `path` atomically: write to `<path>.tmp`, then rename
/// over the target. A reader always observes either the old or the new
/// complete document, even if the process dies mid-write.
pub(crate) fn write_atomic(path: &Path, payload: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.tmp", ext.to_string_lossy()),
        None => "tmp".to_string(),
    });
    fs::write(&tmp, payload)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
