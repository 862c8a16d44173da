// src/differ.rs
//
// Pure diff between the previous snapshot and the current condensed fetch.

use crate::models::{CampaignRecord, STATUS_ACTIVE};
use crate::stores::Snapshot;

/// Changes between two condensed campaign snapshots.
#[derive(Debug, Clone, Default)]
pub struct DropsDiff {
    pub activated: Vec<CampaignRecord>,
}

impl DropsDiff {
    pub fn is_empty(&self) -> bool {
        self.activated.is_empty()
    }
}

/// Return which campaigns newly transitioned to ACTIVE in this cycle.
///
/// A campaign counts as activated only if it was present in the previous
/// snapshot with a non-ACTIVE status. Campaigns never seen before are not
/// reported, so a cold start or wiped snapshot cannot trigger a notification
/// storm. Output order follows `curr`.
pub fn diff(prev: &Snapshot, curr: &[CampaignRecord]) -> DropsDiff {
    let mut activated = Vec::new();
    for c in curr {
        if c.status != STATUS_ACTIVE {
            continue;
        }
        match prev.get(&c.id) {
            Some(entry) if !entry.status.is_empty() && entry.status != STATUS_ACTIVE => {
                activated.push(c.clone());
            }
            _ => {}
        }
    }
    DropsDiff { activated }
}
