// src/platforms/twitch/auth.rs
//
// Token validation and refresh for the first-party Android client. First-party
// flows sometimes refresh through the Passport domain, so refresh tries
// id.twitch.tv first and falls back to passport.twitch.tv with the same
// payload.

use parking_lot::Mutex;
use reqwest::Client as ReqwestClient;
use serde_json::Value;
use tracing::debug;

use super::gql::ANDROID_CLIENT_ID;
use crate::Error;

const VALIDATE_URL: &str = "https://id.twitch.tv/oauth2/validate";
const REFRESH_URLS: [&str; 2] = [
    "https://id.twitch.tv/oauth2/token",
    "https://passport.twitch.tv/oauth2/token",
];

/// Validate a token; returns the validation payload on success, None if the
/// token was rejected by both Authorization schemes.
pub async fn validate_token(http: &ReqwestClient, token: &str) -> Result<Option<Value>, Error> {
    if token.is_empty() {
        return Ok(None);
    }
    for scheme in ["OAuth", "Bearer"] {
        let resp = http
            .get(VALIDATE_URL)
            .header("Authorization", format!("{scheme} {token}"))
            .send()
            .await?;
        if resp.status().is_success() {
            return Ok(Some(resp.json().await?));
        }
    }
    Ok(None)
}

/// Whether a validation payload belongs to the accepted first-party client.
pub fn is_first_party(payload: &Value) -> bool {
    payload.get("client_id").and_then(Value::as_str) == Some(ANDROID_CLIENT_ID)
}

async fn refresh_token(
    http: &ReqwestClient,
    client_id: &str,
    refresh: &str,
) -> Result<Value, Error> {
    let params = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh),
        ("client_id", client_id),
    ];
    let mut errors: Vec<String> = Vec::new();
    for endpoint in REFRESH_URLS {
        match http.post(endpoint).form(&params).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp.json().await?);
                }
                let text = resp.text().await.unwrap_or_default();
                errors.push(format!("{endpoint} -> {status} {text}"));
            }
            Err(e) => errors.push(format!("{endpoint} -> {e}")),
        }
    }
    Err(Error::TwitchAuth(format!("refresh failed: {}", errors.join("; "))))
}

#[derive(Debug, Clone, Default)]
struct TokenState {
    access: String,
    refresh: String,
    /// Secondary refresh token source used to recover when the primary one
    /// belongs to a different client.
    alt_refresh: String,
}

/// Holds the Drops access/refresh tokens and revalidates or refreshes on
/// demand. All state lives here; nothing mutates the process environment.
pub struct TokenManager {
    state: Mutex<TokenState>,
}

impl TokenManager {
    pub fn new(access: String, refresh: String, alt_refresh: String) -> Self {
        Self {
            state: Mutex::new(TokenState {
                access,
                refresh,
                alt_refresh,
            }),
        }
    }

    /// Return a valid first-party access token, refreshing if the current one
    /// no longer validates.
    pub async fn ensure_access_token(&self, http: &ReqwestClient) -> Result<String, Error> {
        let current = self.state.lock().clone();
        if let Some(payload) = validate_token(http, &current.access).await? {
            if is_first_party(&payload) {
                return Ok(current.access);
            }
        }

        let mut errors: Vec<String> = Vec::new();
        for (label, refresh) in [
            ("primary", current.refresh.clone()),
            ("alternate", current.alt_refresh.clone()),
        ] {
            if refresh.is_empty() {
                continue;
            }
            match self.try_refresh(http, &refresh).await {
                Ok(Some(access)) => {
                    debug!("Refreshed Twitch access token via {label} refresh token");
                    return Ok(access);
                }
                Ok(None) => errors.push(format!("{label} refresh produced a non-first-party token")),
                Err(e) => errors.push(format!("{label} refresh failed: {e}")),
            }
        }

        Err(Error::TwitchAuth(format!(
            "Access token invalid and refresh failed using the Android client. \
             Ensure the refresh token belongs to an Android device authorization. \
             Details: {}",
            errors.join("; ")
        )))
    }

    /// Attempt one refresh and validate the result. Returns Ok(None) when the
    /// refreshed token validates but is not first-party.
    async fn try_refresh(
        &self,
        http: &ReqwestClient,
        refresh: &str,
    ) -> Result<Option<String>, Error> {
        let result = refresh_token(http, ANDROID_CLIENT_ID, refresh).await?;
        let Some(access) = result.get("access_token").and_then(Value::as_str) else {
            return Err(Error::TwitchAuth("refresh response missing access_token".to_string()));
        };
        let next_refresh = result
            .get("refresh_token")
            .and_then(Value::as_str)
            .unwrap_or(refresh);
        match validate_token(http, access).await? {
            Some(payload) if is_first_party(&payload) => {
                let mut state = self.state.lock();
                state.access = access.to_string();
                state.refresh = next_refresh.to_string();
                Ok(Some(access.to_string()))
            }
            _ => Ok(None),
        }
    }
}
