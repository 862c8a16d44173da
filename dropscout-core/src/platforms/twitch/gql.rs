// src/platforms/twitch/gql.rs
//
// Persisted-operation GraphQL plumbing for the first-party Android client.
// Drops data is only served to first-party clients, so requests carry the
// Android client id and user agent, and try both Authorization schemes.

use reqwest::Client as ReqwestClient;
use serde_json::{json, Value};

use crate::Error;

/// First-party client id accepted for persisted GQL operations (Android app).
pub const ANDROID_CLIENT_ID: &str = "kd1unb4b3q4t58fwlpcbzcbnm76a8fp";
pub const ANDROID_UA: &str = "Dalvik/2.1.0 (Linux; U; Android 16; SM-S911B Build/TP1A.220624.014) \
     tv.twitch.android.app/25.3.0/2503006";

const GQL_URL: &str = "https://gql.twitch.tv/gql";

/// Builder for persisted GraphQL operation payloads.
#[derive(Debug, Clone)]
pub struct GqlOperation {
    name: &'static str,
    sha256: &'static str,
    variables: Value,
}

impl GqlOperation {
    pub fn new(name: &'static str, sha256: &'static str, variables: Value) -> Self {
        Self {
            name,
            sha256,
            variables,
        }
    }

    /// Same operation with extra variables merged over the defaults.
    pub fn with_variables(&self, extra: Value) -> Self {
        let mut variables = self.variables.clone();
        if let (Some(base), Some(extra)) = (variables.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        Self {
            name: self.name,
            sha256: self.sha256,
            variables,
        }
    }

    pub fn payload(&self) -> Value {
        json!({
            "operationName": self.name,
            "extensions": {
                "persistedQuery": {
                    "version": 1,
                    "sha256Hash": self.sha256,
                }
            },
            "variables": self.variables,
        })
    }
}

pub fn op_inventory() -> GqlOperation {
    GqlOperation::new(
        "Inventory",
        "d86775d0ef16a63a33ad52e80eaff963b2d5b72fada7c991504a57496e1d8e4b",
        json!({"fetchRewardCampaigns": false}),
    )
}

pub fn op_campaigns() -> GqlOperation {
    GqlOperation::new(
        "ViewerDropsDashboard",
        "5a4da2ab3d5b47c9f9ce864e727b2cb346af1e3ea8b897fe8f704a97ff017619",
        json!({"fetchRewardCampaigns": false}),
    )
}

pub fn op_campaign_details(drop_id: &str, channel_login: &str) -> GqlOperation {
    GqlOperation::new(
        "DropCampaignDetails",
        "039277bf98f3130929262cc7c6efd9c141ca3749cb6dca442fc8ead9a53f77c1",
        json!({"dropID": drop_id, "channelLogin": channel_login}),
    )
}

/// POST a GQL request (single op object or batch array), trying the OAuth
/// scheme first and falling back to Bearer on 401/403, persisted-query
/// misses, or responses with no user context.
pub async fn gql_request(
    http: &ReqwestClient,
    token: &str,
    user_agent: &str,
    ops: &Value,
) -> Result<Value, Error> {
    let mut last_error: Option<Error> = None;

    for scheme in ["OAuth", "Bearer"] {
        let resp = http
            .post(GQL_URL)
            .header("Accept", "*/*")
            .header("Client-Id", ANDROID_CLIENT_ID)
            .header("Authorization", format!("{scheme} {token}"))
            .header("User-Agent", user_agent)
            .header("Content-Type", "application/json")
            .header("Origin", "https://www.twitch.tv")
            .header("Referer", "https://www.twitch.tv/")
            .header("Accept-Language", "en-US")
            .json(ops)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            last_error = Some(Error::Twitch(format!("GQL request unauthorized ({status})")));
            continue;
        }
        let text = resp.text().await?;
        let data: Value = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(_) if status.is_success() => {
                return Err(Error::Twitch(format!("Non-JSON GQL response: {text}")));
            }
            Err(_) => {
                return Err(Error::Twitch(format!("GQL request failed ({status}): {text}")));
            }
        };
        if is_persisted_not_found(&data) {
            last_error = Some(Error::Twitch("Persisted query not found".to_string()));
            continue;
        }
        if !status.is_success() {
            return Err(Error::Twitch(format!("GQL request failed ({status}): {text}")));
        }
        // A success with a null currentUser means the token was not accepted
        // for ops that rely on user context; let the other scheme try.
        if lacks_user_context(&data) {
            last_error = Some(Error::Twitch("Missing user context in GQL response".to_string()));
            continue;
        }
        return Ok(data);
    }

    Err(last_error.unwrap_or_else(|| Error::Twitch("GQL request failed: no attempts made".to_string())))
}

fn is_persisted_not_found(data: &Value) -> bool {
    fn object_has_pq_error(obj: &Value) -> bool {
        obj.get("errors")
            .and_then(Value::as_array)
            .is_some_and(|errors| {
                errors.iter().any(|e| {
                    matches!(
                        e.get("message").and_then(Value::as_str),
                        Some("PersistedQueryNotFound") | Some("service error")
                    )
                })
            })
    }
    match data {
        Value::Array(items) => items.iter().any(object_has_pq_error),
        Value::Object(_) => object_has_pq_error(data),
        _ => false,
    }
}

fn lacks_user_context(data: &Value) -> bool {
    data.get("data")
        .and_then(Value::as_object)
        .is_some_and(|d| d.contains_key("currentUser") && d["currentUser"].is_null())
}
