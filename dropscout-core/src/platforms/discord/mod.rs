// src/platforms/discord/mod.rs
//
// Narrow Discord surface the core depends on. The notifier only ever needs
// "which guilds am I in" and "send a message"; everything else stays behind
// this seam so tests can drive it with stubs.

use std::sync::Arc;

use async_trait::async_trait;
use twilight_http::Client as HttpClient;
use twilight_model::channel::message::{AllowedMentions, Embed};
use twilight_model::http::attachment::Attachment;
use twilight_model::id::marker::{ChannelMarker, UserMarker};
use twilight_model::id::Id;
use tracing::warn;

use crate::Error;

/// The slice of guild data target resolution needs.
#[derive(Debug, Clone)]
pub struct GuildInfo {
    pub id: u64,
    pub system_channel_id: Option<u64>,
}

/// A rendered attachment ready to upload.
#[derive(Debug, Clone)]
pub struct MessageAttachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// One outbound notification message.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub attachment: Option<MessageAttachment>,
    /// User ids the content is allowed to ping; kept aligned with the
    /// mentions embedded in `content`.
    pub mention_user_ids: Vec<u64>,
}

/// Minimal chat-platform capability set consumed by the notifier and the
/// command layer.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn fetch_my_guilds(&self) -> Result<Vec<GuildInfo>, Error>;
    async fn create_message(&self, channel_id: u64, message: &OutgoingMessage)
        -> Result<(), Error>;
}

/// `ChatApi` adapter over the twilight HTTP client.
pub struct TwilightChatApi {
    http: Arc<HttpClient>,
}

impl TwilightChatApi {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatApi for TwilightChatApi {
    async fn fetch_my_guilds(&self) -> Result<Vec<GuildInfo>, Error> {
        let guilds = self
            .http
            .current_user_guilds()
            .await
            .map_err(|e| Error::Discord(format!("Failed to list guilds: {e}")))?
            .models()
            .await
            .map_err(|e| Error::Discord(format!("Failed to parse guild list: {e}")))?;

        let mut out = Vec::with_capacity(guilds.len());
        for g in guilds {
            // The partial guild payload has no system channel; fetch the full
            // guild and tolerate failures with None.
            let system_channel_id = match self.http.guild(g.id).await {
                Ok(resp) => match resp.model().await {
                    Ok(full) => full.system_channel_id.map(|id| id.get()),
                    Err(e) => {
                        warn!("Failed to parse guild {}: {e}", g.id);
                        None
                    }
                },
                Err(e) => {
                    warn!("Failed to fetch guild {}: {e}", g.id);
                    None
                }
            };
            out.push(GuildInfo {
                id: g.id.get(),
                system_channel_id,
            });
        }
        Ok(out)
    }

    async fn create_message(
        &self,
        channel_id: u64,
        message: &OutgoingMessage,
    ) -> Result<(), Error> {
        // Ids come from hand-editable JSON stores; a zero would panic in
        // Id::new, so reject it here instead.
        let Some(channel) = Id::<ChannelMarker>::new_checked(channel_id) else {
            return Err(Error::Discord(format!(
                "Invalid notification channel id {channel_id}"
            )));
        };
        let allowed = allowed_user_mentions(&message.mention_user_ids);
        let attachments: Vec<Attachment> = message
            .attachment
            .iter()
            .map(|a| Attachment::from_bytes(a.filename.clone(), a.bytes.clone(), 0))
            .collect();

        let mut req = self.http.create_message(channel);
        if let Some(content) = message.content.as_deref() {
            req = req.content(content);
        }
        req.embeds(&message.embeds)
            .attachments(&attachments)
            .allowed_mentions(Some(&allowed))
            .await
            .map_err(|e| Error::Discord(format!("Failed to send message: {e}")))?;
        Ok(())
    }
}

/// Allow-list for user pings, dropping any zero ids that slipped into the
/// favorites store.
fn allowed_user_mentions(user_ids: &[u64]) -> AllowedMentions {
    AllowedMentions {
        users: user_ids
            .iter()
            .copied()
            .filter_map(Id::<UserMarker>::new_checked)
            .collect(),
        ..AllowedMentions::default()
    }
}
