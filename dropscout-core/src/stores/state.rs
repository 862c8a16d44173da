// src/stores/state.rs
//
// Persists the last condensed campaigns snapshot between polling cycles so
// the differ can detect status transitions across restarts.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{BenefitRecord, CampaignRecord};
use crate::Error;

/// Flattened on-disk form of one campaign, keyed by campaign id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub game_box_art: Option<String>,
    #[serde(default)]
    pub starts_at: Option<String>,
    #[serde(default)]
    pub ends_at: Option<String>,
    #[serde(default)]
    pub benefits: Vec<BenefitRecord>,
}

pub type Snapshot = HashMap<String, SnapshotEntry>;

/// JSON-backed store for the condensed campaign snapshot.
pub struct SnapshotStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load the previously saved snapshot. A missing or unparsable file is
    /// treated as an empty snapshot; the next cycle simply re-baselines.
    pub fn load(&self) -> Snapshot {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Snapshot::new(),
        };
        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Ignoring unparsable snapshot at {:?}: {}", self.path, e);
                Snapshot::new()
            }
        }
    }

    /// Persist the current campaigns for future diffing. Overwrites the whole
    /// document; no partial merges.
    pub fn save(&self, campaigns: &[CampaignRecord]) -> Result<(), Error> {
        let payload: Snapshot = campaigns
            .iter()
            .map(|c| (c.id.clone(), SnapshotEntry::from(c)))
            .collect();
        let json = serde_json::to_string_pretty(&payload)?;
        let _guard = self.write_lock.lock();
        super::write_atomic(&self.path, &json)
    }
}

impl From<&CampaignRecord> for SnapshotEntry {
    fn from(c: &CampaignRecord) -> Self {
        Self {
            id: c.id.clone(),
            name: c.name.clone(),
            status: c.status.clone(),
            game_name: c.game_name.clone(),
            game_box_art: c.game_box_art.clone(),
            starts_at: c.starts_at.clone(),
            ends_at: c.ends_at.clone(),
            benefits: c.benefits.clone(),
        }
    }
}
