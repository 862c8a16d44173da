// src/fetcher.rs
//
// Converts raw GraphQL campaign payloads into condensed CampaignRecords.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::catalog::GameCatalog;
use crate::models::{BenefitRecord, CampaignRecord, STATUS_ACTIVE};
use crate::Error;

/// Upstream campaign feed. The real implementation wraps the Twitch GQL
/// client; tests substitute canned payloads.
#[async_trait]
pub trait CampaignFeed: Send + Sync {
    /// Returns a raw JSON structure with a `campaigns` list of
    /// campaign-shaped records. May fail; callers decide how to degrade.
    async fn fetch_active_campaigns(&self) -> Result<Value, Error>;
}

/// Fetches and condenses Twitch Drops campaign data, feeding observed games
/// into the catalog as a side effect.
pub struct DropsFetcher {
    feed: Arc<dyn CampaignFeed>,
    catalog: Option<Arc<GameCatalog>>,
}

impl DropsFetcher {
    pub fn new(feed: Arc<dyn CampaignFeed>, catalog: Option<Arc<GameCatalog>>) -> Self {
        Self { feed, catalog }
    }

    /// Fetch the current campaigns and condense them to ACTIVE records with
    /// minimal fields. Malformed items are skipped at the smallest possible
    /// granularity; a catalog merge failure never fails the fetch.
    pub async fn fetch_condensed(&self) -> Result<Vec<CampaignRecord>, Error> {
        let data = self.feed.fetch_active_campaigns().await?;
        let records = condense(&data);
        if let Some(catalog) = &self.catalog {
            if let Err(e) = catalog.merge_from_campaigns(&records) {
                warn!("Failed to merge fetched campaigns into game catalog: {e}");
            }
        }
        Ok(records)
    }
}

/// Condense a raw payload into ACTIVE campaign records. Benefits are deduped
/// by id across time-based drops, first occurrence winning.
pub fn condense(data: &Value) -> Vec<CampaignRecord> {
    let campaigns = data
        .get("campaigns")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let mut out = Vec::new();
    for c in campaigns {
        if !c.is_object() {
            continue;
        }
        let status = str_field(c, "status").to_uppercase();
        if status != STATUS_ACTIVE {
            continue;
        }
        let game = c.get("game").filter(|g| g.is_object());
        let game_name = game
            .and_then(|g| opt_str(g, "displayName").or_else(|| opt_str(g, "name")));
        let game_slug = game.and_then(|g| opt_str(g, "slug"));
        let game_box_art = game.and_then(|g| opt_str(g, "boxArtURL"));

        let mut seen_benefit_ids = std::collections::HashSet::new();
        let mut benefits = Vec::new();
        for drop in iter_array(c, "timeBasedDrops") {
            for edge in iter_array(drop, "benefitEdges") {
                let Some(benefit) = edge.get("benefit").filter(|b| b.is_object()) else {
                    continue;
                };
                let id = str_field(benefit, "id");
                if id.is_empty() || !seen_benefit_ids.insert(id.clone()) {
                    continue;
                }
                let name = opt_str(benefit, "name").unwrap_or_else(|| "Unknown".to_string());
                benefits.push(BenefitRecord {
                    id,
                    name,
                    image_url: opt_str(benefit, "imageAssetURL"),
                });
            }
        }

        out.push(CampaignRecord {
            id: str_field(c, "id"),
            name: str_field(c, "name"),
            status,
            game_name,
            game_slug,
            game_box_art,
            starts_at: opt_str(c, "startAt"),
            ends_at: opt_str(c, "endAt"),
            benefits,
        });
    }
    out
}

fn iter_array<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
}

fn str_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn opt_str(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
