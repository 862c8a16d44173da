// src/platforms/twitch/client.rs

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::auth::{validate_token, TokenManager};
use super::gql::{
    gql_request, op_campaign_details, op_campaigns, op_inventory, ANDROID_CLIENT_ID, ANDROID_UA,
};
use crate::catalog::{RankingFeed, TopGame, TopGamesPage};
use crate::fetcher::CampaignFeed;
use crate::models::STATUS_ACTIVE;
use crate::Error;

const HELIX_TOP_GAMES_URL: &str = "https://api.twitch.tv/helix/games/top";
const DETAILS_BATCH_SIZE: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct TwitchConfig {
    pub access_token: String,
    pub refresh_token: String,
    pub alt_refresh_token: String,
    /// Client id for Helix requests; defaults to the Android client id.
    pub helix_client_id: Option<String>,
    pub user_agent: Option<String>,
}

/// Entry point for all Twitch calls: persisted GQL for Drops campaigns and
/// Helix for the top-games ranking.
pub struct TwitchClient {
    http: ReqwestClient,
    tokens: TokenManager,
    helix_client_id: String,
    user_agent: String,
}

impl TwitchClient {
    pub fn new(config: TwitchConfig) -> Self {
        Self {
            http: ReqwestClient::new(),
            tokens: TokenManager::new(
                config.access_token,
                config.refresh_token,
                config.alt_refresh_token,
            ),
            helix_client_id: config
                .helix_client_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| ANDROID_CLIENT_ID.to_string()),
            user_agent: config
                .user_agent
                .filter(|ua| !ua.is_empty())
                .unwrap_or_else(|| ANDROID_UA.to_string()),
        }
    }

    async fn current_login(&self, token: &str) -> Result<String, Error> {
        let payload = validate_token(&self.http, token)
            .await?
            .ok_or_else(|| Error::TwitchAuth("token failed validation after refresh".to_string()))?;
        Ok(payload
            .get("login")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl CampaignFeed for TwitchClient {
    /// Fetch ACTIVE campaigns, merging the dashboard overview with inventory
    /// progress and per-campaign details.
    async fn fetch_active_campaigns(&self) -> Result<Value, Error> {
        let token = self.tokens.ensure_access_token(&self.http).await?;
        let user_login = self.current_login(&token).await?;

        let inventory =
            gql_request(&self.http, &token, &self.user_agent, &op_inventory().payload()).await?;
        let inv_user = inventory
            .get("data")
            .and_then(|d| d.get("currentUser"))
            .filter(|u| u.is_object())
            .ok_or_else(|| Error::Twitch("Missing user context in Inventory response".to_string()))?;
        let ongoing = inv_user
            .get("inventory")
            .and_then(|i| i.get("dropCampaignsInProgress"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let mut inventory_map: Map<String, Value> = Map::new();
        for c in &ongoing {
            if let Some(id) = c.get("id").and_then(Value::as_str) {
                inventory_map.insert(id.to_string(), c.clone());
            }
        }

        let overview =
            gql_request(&self.http, &token, &self.user_agent, &op_campaigns().payload()).await?;
        let all_campaigns = overview
            .get("data")
            .and_then(|d| d.get("currentUser"))
            .filter(|u| u.is_object())
            .ok_or_else(|| Error::Twitch("Missing user context in Campaigns response".to_string()))?
            .get("dropCampaigns")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut ids: Vec<String> = Vec::new();
        let mut available_map: Map<String, Value> = Map::new();
        for c in &all_campaigns {
            if c.get("status").and_then(Value::as_str) != Some(STATUS_ACTIVE) {
                continue;
            }
            if let Some(id) = c.get("id").and_then(Value::as_str) {
                ids.push(id.to_string());
                available_map.insert(id.to_string(), c.clone());
            }
        }

        // Details come from a batched persisted op; items without a user
        // object are skipped rather than failing the whole fetch.
        let mut details: Map<String, Value> = Map::new();
        for batch in ids.chunks(DETAILS_BATCH_SIZE) {
            let ops: Vec<Value> = batch
                .iter()
                .map(|cid| op_campaign_details(cid, &user_login).payload())
                .collect();
            let resp =
                gql_request(&self.http, &token, &self.user_agent, &Value::Array(ops)).await?;
            let Some(items) = resp.as_array() else {
                continue;
            };
            for item in items {
                let Some(campaign) = item
                    .get("data")
                    .and_then(|d| d.get("user"))
                    .filter(|u| u.is_object())
                    .and_then(|u| u.get("dropCampaign"))
                    .filter(|c| c.is_object())
                else {
                    continue;
                };
                if let Some(id) = campaign.get("id").and_then(Value::as_str) {
                    details.insert(id.to_string(), campaign.clone());
                }
            }
        }

        let mut merged_list: Vec<Value> = Vec::with_capacity(ids.len());
        for cid in &ids {
            let primary = inventory_map
                .get(cid)
                .or_else(|| available_map.get(cid))
                .cloned()
                .unwrap_or(Value::Null);
            let merged = match details.get(cid) {
                Some(detail) => merge_values(&primary, detail),
                None => primary,
            };
            merged_list.push(merged);
        }
        debug!("Fetched {} active campaign(s) from Twitch", merged_list.len());

        Ok(json!({ "campaigns": merged_list }))
    }
}

#[async_trait]
impl RankingFeed for TwitchClient {
    async fn top_games_page(&self, cursor: Option<&str>) -> Result<TopGamesPage, Error> {
        let token = self.tokens.ensure_access_token(&self.http).await?;
        let mut query: Vec<(&str, &str)> = vec![("first", "100")];
        if let Some(after) = cursor {
            query.push(("after", after));
        }
        let resp = self
            .http
            .get(HELIX_TOP_GAMES_URL)
            .header("Client-ID", &self.helix_client_id)
            .header("Authorization", format!("Bearer {token}"))
            .header("Accept", "application/json")
            .query(&query)
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Twitch(format!(
                "Failed to fetch Twitch top games ({status}): {text}"
            )));
        }
        let payload: Value = serde_json::from_str(&text)
            .map_err(|e| Error::Twitch(format!("Invalid JSON from Helix games/top: {e}")))?;

        let games = payload
            .get("data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        let name = item.get("name").and_then(Value::as_str)?.trim();
                        if name.is_empty() {
                            return None;
                        }
                        Some(TopGame {
                            id: item
                                .get("id")
                                .and_then(Value::as_str)
                                .filter(|id| !id.is_empty())
                                .map(str::to_string),
                            name: name.to_string(),
                            box_art_url: item
                                .get("box_art_url")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        let cursor = payload
            .get("pagination")
            .and_then(|p| p.get("cursor"))
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(TopGamesPage { games, cursor })
    }
}

/// Deep-merge two JSON objects, preferring `primary` on conflicts; nested
/// objects merge recursively.
pub fn merge_values(primary: &Value, secondary: &Value) -> Value {
    match (primary, secondary) {
        (Value::Object(p), Value::Object(s)) => {
            let mut merged = Map::new();
            for (key, pv) in p {
                match s.get(key) {
                    Some(sv) if pv.is_object() && sv.is_object() => {
                        merged.insert(key.clone(), merge_values(pv, sv));
                    }
                    _ => {
                        merged.insert(key.clone(), pv.clone());
                    }
                }
            }
            for (key, sv) in s {
                if !merged.contains_key(key) {
                    merged.insert(key.clone(), sv.clone());
                }
            }
            Value::Object(merged)
        }
        (Value::Null, _) => secondary.clone(),
        _ => primary.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_primary_and_recurses() {
        let primary = json!({"id": "c1", "game": {"name": "A"}, "self": {"claimed": 1}});
        let secondary = json!({"id": "other", "game": {"name": "B", "slug": "a"}, "endAt": "x"});
        let merged = merge_values(&primary, &secondary);
        assert_eq!(merged["id"], "c1");
        assert_eq!(merged["game"]["name"], "A");
        assert_eq!(merged["game"]["slug"], "a");
        assert_eq!(merged["endAt"], "x");
        assert_eq!(merged["self"]["claimed"], 1);
    }
}
