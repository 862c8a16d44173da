// dropscout-server/src/main.rs

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use twilight_gateway::{
    self as gateway, CloseFrame, Config, Event, EventTypeFlags, Intents, Shard, StreamExt,
};
use twilight_http::client::ClientBuilder;
use twilight_model::gateway::payload::incoming::GuildCreate;

use dropscout_core::cache::{CampaignCache, PageSessionCache};
use dropscout_core::catalog::{warm_catalog, GameCatalog};
use dropscout_core::fetcher::DropsFetcher;
use dropscout_core::monitor::DropsMonitor;
use dropscout_core::notifier::DropsNotifier;
use dropscout_core::platforms::discord::TwilightChatApi;
use dropscout_core::platforms::twitch::TwitchClient;
use dropscout_core::render::DisabledRenderer;
use dropscout_core::stores::{FavoritesStore, GuildConfigStore, SnapshotStore};

mod commands;
mod config;

use commands::CommandContext;
use config::Args;

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("dropscout=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!(
        "DropScout starting. interval={}m, notify_on_boot={}, data_dir={:?}",
        args.interval_minutes, args.notify_on_boot, args.data_dir
    );

    // Shared state and upstream clients.
    let snapshot_store = Arc::new(SnapshotStore::new(args.state_path()));
    let guild_config = Arc::new(GuildConfigStore::new(args.guild_config_path()));
    let favorites = Arc::new(FavoritesStore::new(args.favorites_path()));
    let catalog = Arc::new(GameCatalog::new(args.catalog_path()));
    let twitch = Arc::new(TwitchClient::new(args.twitch_config()));

    let http = Arc::new(
        ClientBuilder::new()
            .token(args.discord_token.clone())
            .timeout(Duration::from_secs(30))
            .build(),
    );
    let application_id = http
        .current_user_application()
        .await?
        .model()
        .await?
        .id;

    let fetcher = Arc::new(DropsFetcher::new(twitch.clone(), Some(catalog.clone())));
    let notifier = Arc::new(DropsNotifier::new(
        Arc::new(TwilightChatApi::new(http.clone())),
        guild_config.clone(),
        favorites.clone(),
        catalog.clone(),
        Arc::new(DisabledRenderer),
        args.notifier_config(),
    ));
    let monitor = Arc::new(DropsMonitor::new(
        fetcher.clone(),
        notifier,
        snapshot_store.clone(),
        Some(catalog.clone()),
        args.monitor_config(),
    ));
    let campaigns = Arc::new(CampaignCache::new(fetcher, args.fetch_ttl()));
    let sessions = Arc::new(PageSessionCache::new(args.session_capacity));

    let commands = Arc::new(CommandContext::new(
        http.clone(),
        application_id,
        catalog.clone(),
        favorites,
        guild_config.clone(),
        campaigns,
        sessions,
    ));
    commands.register_commands().await?;

    // Warm-up runs in the background; catalog-dependent commands stay gated
    // until it flips the ready flag.
    {
        let catalog = catalog.clone();
        let twitch = twitch.clone();
        let state_path = args.state_path();
        tokio::spawn(async move {
            warm_catalog(&catalog, twitch.as_ref(), &state_path).await;
        });
    }

    monitor.start();

    let config = Config::new(args.discord_token.clone(), Intents::GUILDS);
    let shards = gateway::create_recommended(&http, config, |_, b| b.build()).await?;
    let mut senders = Vec::with_capacity(shards.len());
    let mut tasks = Vec::with_capacity(shards.len());
    for shard in shards {
        senders.push(shard.sender());
        let commands = commands.clone();
        let guild_config = guild_config.clone();
        tasks.push(tokio::spawn(shard_runner(shard, commands, guild_config)));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    monitor.stop().await;
    for sender in &senders {
        let _ = sender.close(CloseFrame::NORMAL);
    }
    for task in tasks {
        let _ = task.await;
    }
    info!("DropScout stopped");
    Ok(())
}

async fn shard_runner(
    mut shard: Shard,
    commands: Arc<CommandContext>,
    guild_config: Arc<GuildConfigStore>,
) {
    let shard_id = shard.id().number();
    info!("Shard {shard_id} started");

    while let Some(item) = shard.next_event(EventTypeFlags::all()).await {
        let event = match item {
            Ok(event) => event,
            Err(err) => {
                error!("Shard {shard_id} => error receiving event: {err:?}");
                continue;
            }
        };
        match event {
            Event::Ready(ready) => {
                info!(
                    "Shard {shard_id} => READY as {} (ID={})",
                    ready.user.name, ready.user.id
                );
            }
            Event::InteractionCreate(ev) => {
                commands.handle_interaction(ev.0).await;
            }
            Event::GuildCreate(ev) => {
                if let GuildCreate::Available(guild) = *ev {
                    // Default new guilds to their system channel so
                    // notifications have somewhere to go before anyone runs
                    // /drops-set-channel.
                    if guild_config.get_channel_id(guild.id.get()).is_none() {
                        if let Some(system) = guild.system_channel_id {
                            match guild_config.set_channel_id(guild.id.get(), system.get()) {
                                Ok(()) => info!(
                                    "Guild {} defaulted to system channel {system}",
                                    guild.id
                                ),
                                Err(e) => {
                                    warn!("Failed to store default channel for {}: {e}", guild.id)
                                }
                            }
                        }
                    }
                }
            }
            other => debug!("Shard {shard_id} => unhandled event: {:?}", other.kind()),
        }
    }

    warn!("Shard {shard_id} event loop ended");
}
