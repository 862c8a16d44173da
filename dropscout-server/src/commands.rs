// dropscout-server/src/commands.rs
//
// Slash-command surface. Catalog-backed commands wait on the readiness gate
// with a short timeout and degrade to an ephemeral "try again" reply instead
// of blocking or erroring while the catalog warms up.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::{debug, warn};
use twilight_http::Client as HttpClient;
use twilight_model::application::command::{
    Command, CommandOptionChoice, CommandOptionChoiceValue, CommandType,
};
use twilight_model::application::interaction::application_command::{
    CommandData, CommandDataOption, CommandOptionValue,
};
use twilight_model::application::interaction::{Interaction, InteractionData, InteractionType};
use twilight_model::channel::message::component::{
    ActionRow, Button, ButtonStyle, SelectMenu, SelectMenuOption, SelectMenuType,
};
use twilight_model::channel::message::{Component, Embed, MessageFlags};
use twilight_model::http::interaction::{
    InteractionResponse, InteractionResponseData, InteractionResponseType,
};
use twilight_model::id::marker::ApplicationMarker;
use twilight_model::id::Id;
use twilight_util::builder::command::{
    ChannelBuilder, CommandBuilder, StringBuilder, SubCommandBuilder,
};
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder, ImageSource};

use dropscout_core::cache::{CampaignCache, PageSession, PageSessionCache};
use dropscout_core::catalog::{normalize, GameCatalog, GameEntry};
use dropscout_core::embeds::build_campaign_embed;
use dropscout_core::models::CampaignRecord;
use dropscout_core::stores::{FavoritesStore, GuildConfigStore};

const READY_WAIT: Duration = Duration::from_secs(5);
const NOT_READY_REPLY: &str =
    "Still caching the game catalog; try again in a few seconds.";
const GUILD_ONLY_REPLY: &str = "This command only works inside a server.";
/// Discord allows at most 10 embeds per message.
const MAX_EMBEDS: usize = 10;
const AUTOCOMPLETE_LIMIT: usize = 25;
const CHOICE_MAX_LEN: usize = 100;
/// Discord caps select menus at 25 options.
const SELECT_MAX_OPTIONS: usize = 25;
const VIEW_BUTTON_PREFIX: &str = "drops:view:";
const FAV_REMOVE_PREFIX: &str = "drops:fav-remove:";
const FAV_REFRESH_PREFIX: &str = "drops:fav-refresh:";

/// Everything the command handlers need, injected once at startup.
pub struct CommandContext {
    http: Arc<HttpClient>,
    application_id: Id<ApplicationMarker>,
    catalog: Arc<GameCatalog>,
    favorites: Arc<FavoritesStore>,
    guild_config: Arc<GuildConfigStore>,
    campaigns: Arc<CampaignCache>,
    sessions: Arc<PageSessionCache>,
}

/// One reply, built up by a handler and sent exactly once.
#[derive(Default)]
struct Reply {
    content: Option<String>,
    embeds: Vec<Embed>,
    components: Vec<Component>,
    ephemeral: bool,
}

impl Reply {
    fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ephemeral: true,
            ..Self::default()
        }
    }
}

pub fn command_definitions() -> Vec<Command> {
    vec![
        CommandBuilder::new(
            "drops-active",
            "List Twitch Drop campaigns that are active right now",
            CommandType::ChatInput,
        )
        .build(),
        CommandBuilder::new(
            "drops-this-week",
            "List active Drop campaigns ending before next Monday (UTC)",
            CommandType::ChatInput,
        )
        .build(),
        CommandBuilder::new(
            "drops-set-channel",
            "Choose the channel Drop notifications are posted in",
            CommandType::ChatInput,
        )
        .option(ChannelBuilder::new("channel", "Channel to post notifications in").required(true))
        .build(),
        CommandBuilder::new(
            "drops-channel",
            "Show where Drop notifications are posted in this server",
            CommandType::ChatInput,
        )
        .build(),
        CommandBuilder::new(
            "drops-search",
            "Look up a game and its active Drop campaigns",
            CommandType::ChatInput,
        )
        .option(
            StringBuilder::new("game", "Game to look up")
                .required(true)
                .autocomplete(true),
        )
        .build(),
        CommandBuilder::new(
            "drops-favorites",
            "Manage the games you get pinged about",
            CommandType::ChatInput,
        )
        .option(
            SubCommandBuilder::new("add", "Get pinged when this game's Drops activate").option(
                StringBuilder::new("game", "Game to watch")
                    .required(true)
                    .autocomplete(true),
            ),
        )
        .option(
            SubCommandBuilder::new("remove", "Stop getting pinged for this game").option(
                StringBuilder::new("game", "Game to stop watching")
                    .required(true)
                    .autocomplete(true),
            ),
        )
        .option(SubCommandBuilder::new("view", "Show the games you are watching"))
        .build(),
        CommandBuilder::new(
            "help",
            "Show what this bot does and available commands",
            CommandType::ChatInput,
        )
        .build(),
    ]
}

impl CommandContext {
    pub fn new(
        http: Arc<HttpClient>,
        application_id: Id<ApplicationMarker>,
        catalog: Arc<GameCatalog>,
        favorites: Arc<FavoritesStore>,
        guild_config: Arc<GuildConfigStore>,
        campaigns: Arc<CampaignCache>,
        sessions: Arc<PageSessionCache>,
    ) -> Self {
        Self {
            http,
            application_id,
            catalog,
            favorites,
            guild_config,
            campaigns,
            sessions,
        }
    }

    pub async fn register_commands(&self) -> anyhow::Result<()> {
        let commands = command_definitions();
        self.http
            .interaction(self.application_id)
            .set_global_commands(&commands)
            .await?;
        debug!("Registered {} global slash commands", commands.len());
        Ok(())
    }

    /// Top-level dispatch; failures are logged, never propagated into the
    /// gateway loop.
    pub async fn handle_interaction(&self, interaction: Interaction) {
        let result = match interaction.kind {
            InteractionType::ApplicationCommand => self.handle_command(&interaction).await,
            InteractionType::ApplicationCommandAutocomplete => {
                self.handle_autocomplete(&interaction).await
            }
            InteractionType::MessageComponent => self.handle_component(&interaction).await,
            _ => Ok(()),
        };
        if let Err(e) = result {
            warn!("Failed to handle interaction: {e}");
        }
    }

    async fn handle_command(&self, interaction: &Interaction) -> anyhow::Result<()> {
        let Some(InteractionData::ApplicationCommand(data)) = &interaction.data else {
            return Ok(());
        };
        // Tracks whether an acknowledgement was already sent, so the final
        // reply knows to go through update_response instead.
        let mut deferred = false;
        let reply = match data.name.as_str() {
            "drops-active" => {
                self.defer(interaction, false).await?;
                deferred = true;
                self.drops_active().await
            }
            "drops-this-week" => {
                self.defer(interaction, false).await?;
                deferred = true;
                self.drops_this_week().await
            }
            "drops-set-channel" => self.drops_set_channel(interaction, data),
            "drops-channel" => self.drops_channel(interaction),
            "drops-search" => {
                if !self.catalog.wait_ready(READY_WAIT).await {
                    Reply::ephemeral(NOT_READY_REPLY)
                } else {
                    self.defer(interaction, false).await?;
                    deferred = true;
                    self.drops_search(interaction, data).await
                }
            }
            "drops-favorites" => self.drops_favorites(interaction, data).await,
            "help" => help_reply(),
            other => {
                debug!("Ignoring unknown command {other}");
                return Ok(());
            }
        };
        self.send_reply(interaction, deferred, reply).await
    }

    async fn drops_active(&self) -> Reply {
        match self.campaigns.get().await {
            Ok(records) if records.is_empty() => {
                Reply::text("No Twitch Drop campaigns are active right now.")
            }
            Ok(records) => {
                let total = records.len();
                let embeds: Vec<Embed> = records
                    .iter()
                    .take(MAX_EMBEDS)
                    .map(|c| build_campaign_embed(c, "Active"))
                    .collect();
                let mut content = format!("{total} active Drop campaign(s).");
                if total > MAX_EMBEDS {
                    content.push_str(&format!(" Showing the first {MAX_EMBEDS}."));
                }
                Reply {
                    content: Some(content),
                    embeds,
                    ..Reply::default()
                }
            }
            Err(e) => {
                warn!("Active-campaign lookup failed: {e}");
                Reply::text("Could not reach Twitch right now; try again later.")
            }
        }
    }

    async fn drops_this_week(&self) -> Reply {
        match self.campaigns.get().await {
            Ok(records) => {
                let horizon = next_monday_epoch(Utc::now());
                let ending = campaigns_ending_before(&records, horizon);
                if ending.is_empty() {
                    return Reply::text(
                        "No active Drop campaigns end before next Monday (UTC).",
                    );
                }
                let total = ending.len();
                let embeds: Vec<Embed> = ending
                    .iter()
                    .take(MAX_EMBEDS)
                    .map(|c| build_campaign_embed(c, "Active This Week"))
                    .collect();
                let mut content =
                    format!("{total} Drop campaign(s) ending before next Monday (UTC).");
                if total > MAX_EMBEDS {
                    content.push_str(&format!(" Showing the first {MAX_EMBEDS}."));
                }
                Reply {
                    content: Some(content),
                    embeds,
                    ..Reply::default()
                }
            }
            Err(e) => {
                warn!("This-week campaign lookup failed: {e}");
                Reply::text("Could not reach Twitch right now; try again later.")
            }
        }
    }

    fn drops_set_channel(&self, interaction: &Interaction, data: &CommandData) -> Reply {
        let Some(guild_id) = interaction.guild_id else {
            return Reply::ephemeral(GUILD_ONLY_REPLY);
        };
        let Some(channel_id) = option_channel(&data.options, "channel") else {
            return Reply::ephemeral("Pick a channel to post notifications in.");
        };
        match self.guild_config.set_channel_id(guild_id.get(), channel_id) {
            Ok(()) => Reply::ephemeral(format!(
                "Drop notifications will be posted in <#{channel_id}>."
            )),
            Err(e) => {
                warn!("Failed to store channel for guild {guild_id}: {e}");
                Reply::ephemeral("Could not save that setting; try again.")
            }
        }
    }

    fn drops_channel(&self, interaction: &Interaction) -> Reply {
        let Some(guild_id) = interaction.guild_id else {
            return Reply::ephemeral(GUILD_ONLY_REPLY);
        };
        match self.guild_config.get_channel_id(guild_id.get()) {
            Some(channel_id) => {
                Reply::ephemeral(format!("Drop notifications go to <#{channel_id}>."))
            }
            None => Reply::ephemeral(
                "No channel configured; the server's system channel is used when available. \
                 Use /drops-set-channel to pick one.",
            ),
        }
    }

    async fn drops_search(&self, interaction: &Interaction, data: &CommandData) -> Reply {
        let query = option_str(&data.options, "game").unwrap_or("");
        let Some(entry) = self
            .catalog
            .get(query)
            .or_else(|| self.catalog.search(query, 1).into_iter().next())
        else {
            return Reply::ephemeral(format!("No game found matching \"{query}\"."));
        };

        let (matching, fetch_failed) = match self.campaigns.get().await {
            Ok(records) => (self.matching_campaigns(&entry, &records), false),
            Err(e) => {
                warn!("Campaign lookup during search failed: {e}");
                (Vec::new(), true)
            }
        };

        let mut description = if fetch_failed {
            "Could not check current campaigns; Twitch was unreachable.".to_string()
        } else if matching.is_empty() {
            "No active Drop campaigns for this game right now.".to_string()
        } else {
            let names: Vec<&str> = matching.iter().map(|c| c.name.as_str()).collect();
            format!(
                "{} active Drop campaign(s): {}",
                matching.len(),
                names.join(", ")
            )
        };
        if !entry.aliases.is_empty() {
            description.push_str(&format!("\nAlso known as: {}", entry.aliases.join(", ")));
        }

        let mut builder = EmbedBuilder::new()
            .title(entry.name.clone())
            .description(description);
        if let Some(art) = entry.box_art_url.as_deref() {
            if let Ok(source) = ImageSource::url(art) {
                builder = builder.thumbnail(source);
            }
        }

        let mut components = Vec::new();
        if !matching.is_empty() {
            if let Some(user_id) = interaction.author_id() {
                let token = self.sessions.insert(PageSession {
                    game_key: entry.key.clone(),
                    user_id: user_id.get(),
                });
                components.push(Component::ActionRow(ActionRow {
                    components: vec![Component::Button(Button {
                        custom_id: Some(format!("{VIEW_BUTTON_PREFIX}{token}")),
                        disabled: false,
                        emoji: None,
                        label: Some("Show campaign details".to_string()),
                        style: ButtonStyle::Primary,
                        url: None,
                        sku_id: None,
                    })],
                }));
            }
        }

        Reply {
            content: None,
            embeds: vec![builder.build()],
            components,
            ephemeral: false,
        }
    }

    async fn drops_favorites(&self, interaction: &Interaction, data: &CommandData) -> Reply {
        let Some(guild_id) = interaction.guild_id else {
            return Reply::ephemeral(GUILD_ONLY_REPLY);
        };
        let Some(user_id) = interaction.author_id() else {
            return Reply::ephemeral(GUILD_ONLY_REPLY);
        };
        let Some((sub, options)) = subcommand(data) else {
            return Reply::ephemeral("Pick add, remove, or view.");
        };
        let guild = guild_id.get();
        let user = user_id.get();

        match sub {
            "add" => {
                if !self.catalog.wait_ready(READY_WAIT).await {
                    return Reply::ephemeral(NOT_READY_REPLY);
                }
                let raw = option_str(options, "game").unwrap_or("");
                let Some(key) = self.resolve_key(raw) else {
                    return Reply::ephemeral(format!("No game found matching \"{raw}\"."));
                };
                let display = self.display_name(&key);
                match self.favorites.add_favorite(guild, user, &key) {
                    Ok(true) => Reply::ephemeral(format!(
                        "You'll be pinged when **{display}** Drops activate."
                    )),
                    Ok(false) => {
                        Reply::ephemeral(format!("**{display}** is already in your favorites."))
                    }
                    Err(e) => {
                        warn!("Failed to add favorite for user {user}: {e}");
                        Reply::ephemeral("Could not save that favorite; try again.")
                    }
                }
            }
            "remove" => {
                let raw = option_str(options, "game").unwrap_or("");
                let key = self.resolve_key(raw).unwrap_or_else(|| normalize(raw));
                let display = self.display_name(&key);
                match self.favorites.remove_favorite(guild, user, &key) {
                    Ok(true) => {
                        Reply::ephemeral(format!("Removed **{display}** from your favorites."))
                    }
                    Ok(false) => {
                        Reply::ephemeral(format!("**{display}** was not in your favorites."))
                    }
                    Err(e) => {
                        warn!("Failed to remove favorite for user {user}: {e}");
                        Reply::ephemeral("Could not update your favorites; try again.")
                    }
                }
            }
            "view" => self.favorites_overview(guild, user),
            other => {
                debug!("Ignoring unknown favorites subcommand {other}");
                Reply::ephemeral("Pick add, remove, or view.")
            }
        }
    }

    /// The interactive favorites overview: the list itself, a select menu for
    /// bulk removal, and a refresh button. Each render gets a fresh session
    /// token so stale controls expire naturally.
    fn favorites_overview(&self, guild: u64, user: u64) -> Reply {
        let keys = self.favorites.get_user_favorites(guild, user);
        if keys.is_empty() {
            return Reply::ephemeral(
                "You are not watching any games yet. Use /drops-favorites add.",
            );
        }
        let entries: Vec<(String, String)> = keys
            .iter()
            .map(|key| (key.clone(), self.display_name(key)))
            .collect();
        let token = self.sessions.insert(PageSession {
            game_key: String::new(),
            user_id: user,
        });
        Reply {
            content: Some(favorites_overview_content(&entries)),
            components: favorites_overview_components(&token, &entries),
            ephemeral: true,
            ..Reply::default()
        }
    }

    async fn handle_autocomplete(&self, interaction: &Interaction) -> anyhow::Result<()> {
        let Some(InteractionData::ApplicationCommand(data)) = &interaction.data else {
            return Ok(());
        };
        let query = focused_value(&data.options).unwrap_or("");
        let choices = if !self.catalog.is_ready() {
            Vec::new()
        } else if data.name == "drops-favorites" && subcommand(data).is_some_and(|(s, _)| s == "remove")
        {
            self.favorite_choices(interaction, query)
        } else {
            self.catalog
                .search(query, AUTOCOMPLETE_LIMIT)
                .into_iter()
                .map(|entry| choice(&entry.name, &entry.key))
                .collect()
        };

        let response = InteractionResponse {
            kind: InteractionResponseType::ApplicationCommandAutocompleteResult,
            data: Some(InteractionResponseData {
                choices: Some(choices),
                ..Default::default()
            }),
        };
        self.http
            .interaction(self.application_id)
            .create_response(interaction.id, &interaction.token, &response)
            .await?;
        Ok(())
    }

    /// Completion source for the remove subcommand: the invoker's own
    /// favorites, not the whole catalog.
    fn favorite_choices(&self, interaction: &Interaction, query: &str) -> Vec<CommandOptionChoice> {
        let (Some(guild_id), Some(user_id)) = (interaction.guild_id, interaction.author_id())
        else {
            return Vec::new();
        };
        let needle = normalize(query);
        self.favorites
            .get_user_favorites(guild_id.get(), user_id.get())
            .into_iter()
            .filter(|key| needle.is_empty() || key.contains(&needle))
            .take(AUTOCOMPLETE_LIMIT)
            .map(|key| {
                let display = self.display_name(&key);
                choice(&display, &key)
            })
            .collect()
    }

    async fn handle_component(&self, interaction: &Interaction) -> anyhow::Result<()> {
        let Some(InteractionData::MessageComponent(data)) = &interaction.data else {
            return Ok(());
        };
        if let Some(token) = data.custom_id.strip_prefix(VIEW_BUTTON_PREFIX) {
            return self.campaign_details_component(interaction, token).await;
        }
        if let Some(token) = data.custom_id.strip_prefix(FAV_REMOVE_PREFIX) {
            return self
                .favorites_remove_component(interaction, token, &data.values)
                .await;
        }
        if let Some(token) = data.custom_id.strip_prefix(FAV_REFRESH_PREFIX) {
            return self.favorites_refresh_component(interaction, token).await;
        }
        Ok(())
    }

    async fn campaign_details_component(
        &self,
        interaction: &Interaction,
        token: &str,
    ) -> anyhow::Result<()> {
        let session = match self.check_session(
            interaction,
            token,
            "This view has expired; run /drops-search again.",
        ) {
            Ok(session) => session,
            Err(reply) => return self.send_reply(interaction, false, reply).await,
        };

        self.defer(interaction, true).await?;
        let reply = match (self.catalog.get(&session.game_key), self.campaigns.get().await) {
            (Some(entry), Ok(records)) => {
                let matching = self.matching_campaigns(&entry, &records);
                if matching.is_empty() {
                    Reply::ephemeral("No active Drop campaigns for this game anymore.")
                } else {
                    let embeds: Vec<Embed> = matching
                        .iter()
                        .take(MAX_EMBEDS)
                        .map(|c| build_campaign_embed(c, "Active"))
                        .collect();
                    Reply {
                        embeds,
                        ephemeral: true,
                        ..Reply::default()
                    }
                }
            }
            (None, _) => Reply::ephemeral("That game is no longer in the catalog."),
            (_, Err(e)) => {
                warn!("Campaign lookup for component failed: {e}");
                Reply::ephemeral("Could not reach Twitch right now; try again later.")
            }
        };
        self.sessions.remove(token);
        self.send_reply(interaction, true, reply).await
    }

    /// Bulk removal from the favorites overview's select menu; re-renders the
    /// overview in place so the controls always reflect the stored state.
    async fn favorites_remove_component(
        &self,
        interaction: &Interaction,
        token: &str,
        values: &[String],
    ) -> anyhow::Result<()> {
        let session = match self.check_session(
            interaction,
            token,
            "This view has expired; run /drops-favorites view again.",
        ) {
            Ok(session) => session,
            Err(reply) => return self.send_reply(interaction, false, reply).await,
        };
        let Some(guild_id) = interaction.guild_id else {
            return self
                .send_reply(interaction, false, Reply::ephemeral(GUILD_ONLY_REPLY))
                .await;
        };
        let removed = match self
            .favorites
            .remove_many(guild_id.get(), session.user_id, values.iter())
        {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Bulk favorite removal failed for user {}: {e}", session.user_id);
                return self
                    .send_reply(
                        interaction,
                        false,
                        Reply::ephemeral("Could not update your favorites; try again."),
                    )
                    .await;
            }
        };
        self.sessions.remove(token);
        let mut reply = self.favorites_overview(guild_id.get(), session.user_id);
        reply.content = Some(format!(
            "Removed {removed} game(s).\n{}",
            reply.content.unwrap_or_default()
        ));
        self.update_message(interaction, reply).await
    }

    async fn favorites_refresh_component(
        &self,
        interaction: &Interaction,
        token: &str,
    ) -> anyhow::Result<()> {
        let session = match self.check_session(
            interaction,
            token,
            "This view has expired; run /drops-favorites view again.",
        ) {
            Ok(session) => session,
            Err(reply) => return self.send_reply(interaction, false, reply).await,
        };
        let Some(guild_id) = interaction.guild_id else {
            return self
                .send_reply(interaction, false, Reply::ephemeral(GUILD_ONLY_REPLY))
                .await;
        };
        self.sessions.remove(token);
        let reply = self.favorites_overview(guild_id.get(), session.user_id);
        self.update_message(interaction, reply).await
    }

    /// Resolve a component session token and verify the clicker owns it.
    fn check_session(
        &self,
        interaction: &Interaction,
        token: &str,
        expired_reply: &str,
    ) -> Result<PageSession, Reply> {
        let Some(session) = self.sessions.get(token) else {
            return Err(Reply::ephemeral(expired_reply));
        };
        if interaction.author_id().map(Id::get) != Some(session.user_id) {
            return Err(Reply::ephemeral(
                "Only the user who opened this view can use it.",
            ));
        }
        Ok(session)
    }

    fn matching_campaigns(
        &self,
        entry: &GameEntry,
        records: &[CampaignRecord],
    ) -> Vec<CampaignRecord> {
        records
            .iter()
            .filter(|c| self.catalog.matches_campaign(entry, c))
            .cloned()
            .collect()
    }

    fn resolve_key(&self, raw: &str) -> Option<String> {
        self.catalog.get(raw).map(|entry| entry.key)
    }

    fn display_name(&self, key: &str) -> String {
        self.catalog
            .get(key)
            .map(|entry| entry.name)
            .unwrap_or_else(|| key.to_string())
    }

    async fn defer(&self, interaction: &Interaction, ephemeral: bool) -> anyhow::Result<()> {
        let response = InteractionResponse {
            kind: InteractionResponseType::DeferredChannelMessageWithSource,
            data: Some(InteractionResponseData {
                flags: ephemeral.then_some(MessageFlags::EPHEMERAL),
                ..Default::default()
            }),
        };
        self.http
            .interaction(self.application_id)
            .create_response(interaction.id, &interaction.token, &response)
            .await?;
        Ok(())
    }

    async fn send_reply(
        &self,
        interaction: &Interaction,
        deferred: bool,
        reply: Reply,
    ) -> anyhow::Result<()> {
        let client = self.http.interaction(self.application_id);
        if deferred {
            client
                .update_response(&interaction.token)
                .content(reply.content.as_deref())
                .embeds(Some(&reply.embeds))
                .components(Some(&reply.components))
                .await?;
        } else {
            let response = InteractionResponse {
                kind: InteractionResponseType::ChannelMessageWithSource,
                data: Some(InteractionResponseData {
                    content: reply.content,
                    embeds: Some(reply.embeds),
                    components: Some(reply.components),
                    flags: reply.ephemeral.then_some(MessageFlags::EPHEMERAL),
                    ..Default::default()
                }),
            };
            client
                .create_response(interaction.id, &interaction.token, &response)
                .await?;
        }
        Ok(())
    }

    /// Edit the message the component lives on instead of posting a new one.
    async fn update_message(&self, interaction: &Interaction, reply: Reply) -> anyhow::Result<()> {
        let response = InteractionResponse {
            kind: InteractionResponseType::UpdateMessage,
            data: Some(InteractionResponseData {
                content: reply.content,
                embeds: Some(reply.embeds),
                components: Some(reply.components),
                ..Default::default()
            }),
        };
        self.http
            .interaction(self.application_id)
            .create_response(interaction.id, &interaction.token, &response)
            .await?;
        Ok(())
    }
}

fn help_reply() -> Reply {
    let embed = EmbedBuilder::new()
        .title("DropScout Help")
        .description(
            "DropScout surfaces ACTIVE Twitch Drops campaigns and notifies your \
             server when campaigns go live.",
        )
        .field(EmbedFieldBuilder::new(
            "/drops-active",
            "List currently active campaigns.",
        ))
        .field(EmbedFieldBuilder::new(
            "/drops-this-week",
            "List active campaigns ending before next Monday (UTC).",
        ))
        .field(EmbedFieldBuilder::new(
            "/drops-search <game>",
            "Find a game and show its active campaigns.",
        ))
        .field(EmbedFieldBuilder::new(
            "/drops-set-channel <channel>",
            "Set the channel for notifications in this server.",
        ))
        .field(EmbedFieldBuilder::new(
            "/drops-channel",
            "Show the configured notifications channel.",
        ))
        .field(EmbedFieldBuilder::new(
            "/drops-favorites add|remove|view",
            "Manage the games you get pinged about.",
        ))
        .build();
    Reply {
        embeds: vec![embed],
        ephemeral: true,
        ..Reply::default()
    }
}

/// Midnight at the start of next Monday, UTC. Invocations on a Monday roll a
/// full week ahead so the window always looks forward.
fn next_monday_epoch(now: DateTime<Utc>) -> i64 {
    let weekday = i64::from(now.weekday().num_days_from_monday());
    let days_ahead = if weekday == 0 { 7 } else { 7 - weekday };
    let midnight = now.timestamp() - i64::from(now.num_seconds_from_midnight());
    midnight + days_ahead * 86_400
}

/// Active campaigns whose end falls on or before `horizon`, soonest-ending
/// first. Campaigns with no parseable end date are kept and sort last.
fn campaigns_ending_before(records: &[CampaignRecord], horizon: i64) -> Vec<CampaignRecord> {
    let mut out: Vec<CampaignRecord> = records
        .iter()
        .filter(|c| c.is_active() && c.ends_epoch().unwrap_or(0) <= horizon)
        .cloned()
        .collect();
    out.sort_by_key(|c| c.ends_epoch().unwrap_or(horizon));
    out
}

fn favorites_overview_content(entries: &[(String, String)]) -> String {
    let lines: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(i, (_, display))| format!("{}. {}", i + 1, display))
        .collect();
    format!("Your watched games:\n{}", lines.join("\n"))
}

fn favorites_overview_components(token: &str, entries: &[(String, String)]) -> Vec<Component> {
    let options: Vec<SelectMenuOption> = entries
        .iter()
        .take(SELECT_MAX_OPTIONS)
        .map(|(key, display)| SelectMenuOption {
            default: false,
            description: None,
            emoji: None,
            label: truncate(display, CHOICE_MAX_LEN),
            value: truncate(key, CHOICE_MAX_LEN),
        })
        .collect();
    let count = options.len() as u8;
    vec![
        Component::ActionRow(ActionRow {
            components: vec![Component::SelectMenu(SelectMenu {
                channel_types: None,
                custom_id: format!("{FAV_REMOVE_PREFIX}{token}"),
                default_values: None,
                disabled: false,
                kind: SelectMenuType::Text,
                max_values: Some(count),
                min_values: Some(1),
                options: Some(options),
                placeholder: Some("Select games to stop watching".to_string()),
            })],
        }),
        Component::ActionRow(ActionRow {
            components: vec![Component::Button(Button {
                custom_id: Some(format!("{FAV_REFRESH_PREFIX}{token}")),
                disabled: false,
                emoji: None,
                label: Some("Refresh".to_string()),
                style: ButtonStyle::Secondary,
                url: None,
                sku_id: None,
            })],
        }),
    ]
}

fn choice(name: &str, value: &str) -> CommandOptionChoice {
    CommandOptionChoice {
        name: truncate(name, CHOICE_MAX_LEN),
        name_localizations: None,
        value: CommandOptionChoiceValue::String(truncate(value, CHOICE_MAX_LEN)),
    }
}

fn truncate(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

fn option_str<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a str> {
    options.iter().find_map(|opt| match &opt.value {
        CommandOptionValue::String(value) if opt.name == name => Some(value.as_str()),
        _ => None,
    })
}

fn option_channel(options: &[CommandDataOption], name: &str) -> Option<u64> {
    options.iter().find_map(|opt| match &opt.value {
        CommandOptionValue::Channel(id) if opt.name == name => Some(id.get()),
        _ => None,
    })
}

fn subcommand(data: &CommandData) -> Option<(&str, &[CommandDataOption])> {
    data.options.iter().find_map(|opt| match &opt.value {
        CommandOptionValue::SubCommand(options) => Some((opt.name.as_str(), options.as_slice())),
        _ => None,
    })
}

/// The option currently being typed, searching one level into subcommands.
fn focused_value(options: &[CommandDataOption]) -> Option<&str> {
    for opt in options {
        match &opt.value {
            CommandOptionValue::Focused(value, _) => return Some(value.as_str()),
            CommandOptionValue::SubCommand(inner) => {
                if let Some(value) = focused_value(inner) {
                    return Some(value);
                }
            }
            _ => {}
        }
    }
    None
}
