// src/notifier.rs
//
// Fan-out of "campaign is now ACTIVE" notifications: resolves a target
// channel per guild, mentions the users watching a matching game, and sends
// one message per (target, campaign) pair with best-effort delivery.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use twilight_model::channel::message::embed::EmbedImage;

use crate::catalog::{normalize, GameCatalog};
use crate::differ::DropsDiff;
use crate::embeds::build_campaign_embed;
use crate::models::CampaignRecord;
use crate::platforms::discord::{ChatApi, MessageAttachment, OutgoingMessage};
use crate::render::{CollageRenderer, RenderOptions};
use crate::stores::{FavoritesStore, GuildConfigStore};

/// Character budget for the mention string prepended to each notification.
pub const MENTION_BUDGET: usize = 1800;
const TRUNCATION_MARKER: char = '…';

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// Collage renders allowed per notify call; 0 means unbounded.
    pub max_attachments: usize,
    /// Pause between consecutive sends to stay under rate limits.
    pub send_delay: Duration,
    pub render_opts: RenderOptions,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_attachments: 1,
            send_delay: Duration::from_millis(350),
            render_opts: RenderOptions::default(),
        }
    }
}

/// Sends change notifications to each guild's configured channel.
pub struct DropsNotifier {
    chat: Arc<dyn ChatApi>,
    guild_store: Arc<GuildConfigStore>,
    favorites: Arc<FavoritesStore>,
    catalog: Arc<GameCatalog>,
    renderer: Arc<dyn CollageRenderer>,
    config: NotifierConfig,
}

impl DropsNotifier {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        guild_store: Arc<GuildConfigStore>,
        favorites: Arc<FavoritesStore>,
        catalog: Arc<GameCatalog>,
        renderer: Arc<dyn CollageRenderer>,
        config: NotifierConfig,
    ) -> Self {
        Self {
            chat,
            guild_store,
            favorites,
            catalog,
            renderer,
            config,
        }
    }

    /// Post notifications for any newly ACTIVE campaigns. An empty diff is a
    /// pure no-op; delivery failures are logged per message and never abort
    /// the remaining sends.
    pub async fn notify(&self, diff: &DropsDiff) {
        if diff.is_empty() {
            return;
        }
        let targets = self.resolve_targets().await;
        if targets.is_empty() {
            debug!("No notification targets resolved; skipping delivery");
            return;
        }

        let mut attachments_used = 0usize;
        let mut sent_any = false;
        for campaign in &diff.activated {
            let mut embed = build_campaign_embed(campaign, "Now Active");
            let mut attachment: Option<MessageAttachment> = None;
            if self.config.max_attachments == 0 || attachments_used < self.config.max_attachments {
                if let Some(collage) = self
                    .renderer
                    .render(campaign, self.config.render_opts)
                    .await
                {
                    embed.image = Some(EmbedImage {
                        url: format!("attachment://{}", collage.filename),
                        proxy_url: None,
                        height: None,
                        width: None,
                    });
                    attachment = Some(MessageAttachment {
                        filename: collage.filename,
                        bytes: collage.png,
                    });
                    attachments_used += 1;
                }
            }
            if attachment.is_none() {
                // Render failed or budget exhausted: link the first raw
                // benefit image, or ship the embed without one.
                if let Some(url) = campaign
                    .benefits
                    .iter()
                    .find_map(|b| b.image_url.clone())
                {
                    embed.image = Some(EmbedImage {
                        url,
                        proxy_url: None,
                        height: None,
                        width: None,
                    });
                }
            }

            let keys = self.resolve_campaign_keys(campaign);
            for (guild_id, channel_id) in &targets {
                let watchers = self.favorites.get_watchers(*guild_id, keys.iter());
                let mut user_ids: Vec<u64> = watchers.into_keys().collect();
                user_ids.sort_unstable();
                let (mention_text, included) = join_mentions(&user_ids, MENTION_BUDGET);

                let message = OutgoingMessage {
                    content: if mention_text.is_empty() {
                        None
                    } else {
                        Some(mention_text)
                    },
                    embeds: vec![embed.clone()],
                    attachment: attachment.clone(),
                    mention_user_ids: included,
                };
                // Rate-limit pause goes between sends, never after the last
                // one.
                if sent_any {
                    tokio::time::sleep(self.config.send_delay).await;
                }
                if let Err(e) = self.chat.create_message(*channel_id, &message).await {
                    warn!(
                        "Failed to notify channel {channel_id} about campaign {}: {e}",
                        campaign.id
                    );
                }
                sent_any = true;
            }
        }
    }

    /// One (guild, channel) target per guild the bot belongs to: the
    /// configured channel if set, else the guild's system channel, else the
    /// guild is skipped. A failed guild listing yields zero targets.
    async fn resolve_targets(&self) -> Vec<(u64, u64)> {
        let guilds = match self.chat.fetch_my_guilds().await {
            Ok(guilds) => guilds,
            Err(e) => {
                warn!("Failed to fetch guild list for notifications: {e}");
                return Vec::new();
            }
        };
        let mut targets = Vec::new();
        for g in guilds {
            if let Some(cid) = self.guild_store.get_channel_id(g.id) {
                targets.push((g.id, cid));
            } else if let Some(scid) = g.system_channel_id {
                targets.push((g.id, scid));
            }
        }
        targets
    }

    /// Canonical favorite keys this campaign can match: the normalized game
    /// name and slug, plus whatever canonical key the catalog resolves them
    /// to.
    pub fn resolve_campaign_keys(&self, campaign: &CampaignRecord) -> HashSet<String> {
        let mut keys = HashSet::new();
        for raw in [
            campaign.game_name.as_deref(),
            campaign.game_slug.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            let candidate = normalize(raw);
            if candidate.is_empty() {
                continue;
            }
            if let Some(entry) = self.catalog.get(&candidate) {
                keys.insert(entry.key);
            }
            keys.insert(candidate);
        }
        keys
    }
}

/// Concatenate `<@id>` mention tokens (ids assumed ascending) until the next
/// token would overflow `budget` characters, then append a truncation marker.
/// The produced string never exceeds the budget. Returns the string and the
/// ids actually included, for the allowed-mentions list.
pub fn join_mentions(user_ids: &[u64], budget: usize) -> (String, Vec<u64>) {
    let mut text = String::new();
    let mut included = Vec::new();
    let mut truncated = false;
    for id in user_ids {
        let token = format!("<@{id}>");
        // Reserve one char for the marker so the budget holds even when we
        // stop here.
        let sep = usize::from(!text.is_empty());
        if text.chars().count() + sep + token.chars().count() + 1 > budget {
            truncated = true;
            break;
        }
        if sep == 1 {
            text.push(' ');
        }
        text.push_str(&token);
        included.push(*id);
    }
    if truncated {
        text.push(TRUNCATION_MARKER);
    }
    (text, included)
}
