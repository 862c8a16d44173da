// src/models.rs

use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Condensed representation of a drop benefit (reward).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenefitRecord {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
}

/// Condensed representation of a Twitch Drops campaign.
///
/// Includes only the fields needed by commands and notifications. Status is
/// kept as the upstream string; the only value the bot reacts to is `ACTIVE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: String,
    pub name: String,
    pub status: String,
    pub game_name: Option<String>,
    pub game_slug: Option<String>,
    pub game_box_art: Option<String>,
    pub starts_at: Option<String>,
    pub ends_at: Option<String>,
    pub benefits: Vec<BenefitRecord>,
}

pub const STATUS_ACTIVE: &str = "ACTIVE";

impl CampaignRecord {
    pub fn is_active(&self) -> bool {
        self.status == STATUS_ACTIVE
    }

    /// Campaign start time as UTC epoch seconds, or None if absent/unparsable.
    pub fn starts_epoch(&self) -> Option<i64> {
        to_epoch_seconds(self.starts_at.as_deref())
    }

    /// Campaign end time as UTC epoch seconds, or None if absent/unparsable.
    pub fn ends_epoch(&self) -> Option<i64> {
        to_epoch_seconds(self.ends_at.as_deref())
    }
}

/// Convert an ISO 8601 string to UTC epoch seconds. Twitch emits both `Z` and
/// offset forms; either parses through RFC 3339.
fn to_epoch_seconds(value: Option<&str>) -> Option<i64> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.timestamp())
}
