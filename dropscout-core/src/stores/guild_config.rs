// src/stores/guild_config.rs

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuildSettings {
    #[serde(default)]
    pub channel_id: Option<u64>,
}

/// JSON-backed store for guild-specific settings. Currently only the
/// notifications channel id per guild.
pub struct GuildConfigStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl GuildConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load_unlocked(&self) -> HashMap<String, GuildSettings> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return HashMap::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(e) => {
                warn!("Ignoring unparsable guild config at {:?}: {}", self.path, e);
                HashMap::new()
            }
        }
    }

    /// Load all guild configs, returning an empty map if missing or corrupt.
    pub fn load(&self) -> HashMap<String, GuildSettings> {
        let _guard = self.lock.lock();
        self.load_unlocked()
    }

    pub fn get_channel_id(&self, guild_id: u64) -> Option<u64> {
        self.load().get(&guild_id.to_string())?.channel_id
    }

    /// Set the notifications channel for a guild (read-modify-write under the
    /// store lock, persisted atomically).
    pub fn set_channel_id(&self, guild_id: u64, channel_id: u64) -> Result<(), Error> {
        let _guard = self.lock.lock();
        let mut data = self.load_unlocked();
        data.entry(guild_id.to_string()).or_default().channel_id = Some(channel_id);
        let json = serde_json::to_string_pretty(&data)?;
        super::write_atomic(&self.path, &json)
    }
}
