// dropscout-core/tests/notifier_tests.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use dropscout_core::catalog::{GameCatalog, GameEntry};
use dropscout_core::differ::DropsDiff;
use dropscout_core::models::{BenefitRecord, CampaignRecord};
use dropscout_core::notifier::{join_mentions, DropsNotifier, NotifierConfig, MENTION_BUDGET};
use dropscout_core::platforms::discord::{ChatApi, GuildInfo, OutgoingMessage};
use dropscout_core::render::{CollageRenderer, DisabledRenderer, RenderOptions, RenderedCollage};
use dropscout_core::stores::{FavoritesStore, GuildConfigStore};
use dropscout_core::Error;

#[derive(Default)]
struct RecordingChat {
    guilds: Vec<GuildInfo>,
    guild_fetches: Mutex<usize>,
    sent: Mutex<Vec<(u64, OutgoingMessage)>>,
    fail_channels: Vec<u64>,
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn fetch_my_guilds(&self) -> Result<Vec<GuildInfo>, Error> {
        *self.guild_fetches.lock() += 1;
        Ok(self.guilds.clone())
    }

    async fn create_message(
        &self,
        channel_id: u64,
        message: &OutgoingMessage,
    ) -> Result<(), Error> {
        if self.fail_channels.contains(&channel_id) {
            return Err(Error::Discord(format!("channel {channel_id} rejected")));
        }
        self.sent.lock().push((channel_id, message.clone()));
        Ok(())
    }
}

struct FixedRenderer;

#[async_trait]
impl CollageRenderer for FixedRenderer {
    async fn render(
        &self,
        campaign: &CampaignRecord,
        _opts: RenderOptions,
    ) -> Option<RenderedCollage> {
        Some(RenderedCollage {
            png: vec![0x89, 0x50, 0x4e, 0x47],
            filename: format!("{}.png", campaign.id),
        })
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    chat: Arc<RecordingChat>,
    guild_store: Arc<GuildConfigStore>,
    favorites: Arc<FavoritesStore>,
    catalog: Arc<GameCatalog>,
}

impl Fixture {
    fn new(guilds: Vec<GuildInfo>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let chat = Arc::new(RecordingChat {
            guilds,
            ..Default::default()
        });
        let guild_store = Arc::new(GuildConfigStore::new(dir.path().join("guild.json")));
        let favorites = Arc::new(FavoritesStore::new(dir.path().join("favorites.json")));
        let catalog = Arc::new(GameCatalog::new(dir.path().join("catalog.json")));
        Self {
            _dir: dir,
            chat,
            guild_store,
            favorites,
            catalog,
        }
    }

    fn notifier(&self, renderer: Arc<dyn CollageRenderer>, config: NotifierConfig) -> DropsNotifier {
        DropsNotifier::new(
            self.chat.clone(),
            self.guild_store.clone(),
            self.favorites.clone(),
            self.catalog.clone(),
            renderer,
            config,
        )
    }
}

fn fast_config() -> NotifierConfig {
    NotifierConfig {
        send_delay: Duration::from_millis(0),
        ..NotifierConfig::default()
    }
}

fn campaign(id: &str, game: &str) -> CampaignRecord {
    CampaignRecord {
        id: id.to_string(),
        name: format!("{game} Drops"),
        status: "ACTIVE".to_string(),
        game_name: Some(game.to_string()),
        game_slug: Some(game.to_lowercase().replace(' ', "-")),
        game_box_art: None,
        starts_at: Some("2024-01-01T00:00:00Z".to_string()),
        ends_at: Some("2024-01-15T00:00:00Z".to_string()),
        benefits: vec![BenefitRecord {
            id: format!("{id}-b1"),
            name: "Weapon Charm".to_string(),
            image_url: Some("https://img/benefit".to_string()),
        }],
    }
}

fn diff_of(campaigns: Vec<CampaignRecord>) -> DropsDiff {
    DropsDiff { activated: campaigns }
}

#[tokio::test]
async fn empty_diff_makes_no_api_calls() {
    let fixture = Fixture::new(vec![GuildInfo {
        id: 1,
        system_channel_id: Some(100),
    }]);
    let notifier = fixture.notifier(Arc::new(DisabledRenderer), fast_config());

    notifier.notify(&diff_of(vec![])).await;

    assert_eq!(*fixture.chat.guild_fetches.lock(), 0);
    assert!(fixture.chat.sent.lock().is_empty());
}

#[tokio::test]
async fn configured_channel_wins_over_system_channel() {
    let fixture = Fixture::new(vec![
        GuildInfo {
            id: 1,
            system_channel_id: Some(100),
        },
        GuildInfo {
            id: 2,
            system_channel_id: Some(200),
        },
        GuildInfo {
            id: 3,
            system_channel_id: None,
        },
    ]);
    fixture.guild_store.set_channel_id(1, 555).unwrap();
    let notifier = fixture.notifier(Arc::new(DisabledRenderer), fast_config());

    notifier.notify(&diff_of(vec![campaign("c1", "Valorant")])).await;

    let sent = fixture.chat.sent.lock();
    let channels: Vec<u64> = sent.iter().map(|(c, _)| *c).collect();
    // Guild 1 uses its configured channel, guild 2 falls back to its system
    // channel, guild 3 has nowhere to post.
    assert_eq!(channels, vec![555, 200]);
}

#[tokio::test]
async fn watchers_are_mentioned_and_allowlisted() {
    let fixture = Fixture::new(vec![GuildInfo {
        id: 1,
        system_channel_id: Some(100),
    }]);
    fixture.favorites.add_favorite(1, 10, "valorant").unwrap();
    fixture.favorites.add_favorite(1, 11, "valorant").unwrap();
    fixture.favorites.add_favorite(1, 12, "apex legends").unwrap();
    let notifier = fixture.notifier(Arc::new(DisabledRenderer), fast_config());

    notifier.notify(&diff_of(vec![campaign("c1", "Valorant")])).await;

    let sent = fixture.chat.sent.lock();
    assert_eq!(sent.len(), 1);
    let (_, message) = &sent[0];
    assert_eq!(message.content.as_deref(), Some("<@10> <@11>"));
    assert_eq!(message.mention_user_ids, vec![10, 11]);
    assert_eq!(message.embeds.len(), 1);
}

#[tokio::test]
async fn catalog_aliases_route_watchers_to_the_campaign() {
    let fixture = Fixture::new(vec![GuildInfo {
        id: 1,
        system_channel_id: Some(100),
    }]);
    // The user favorited the canonical key; the campaign carries an alias.
    fixture
        .catalog
        .merge_games(vec![GameEntry {
            key: "call of duty".to_string(),
            name: "Call of Duty".to_string(),
            weight: 500,
            aliases: vec!["cod".to_string()],
            sources: vec!["helix".to_string()],
            ..Default::default()
        }])
        .unwrap();
    fixture.favorites.add_favorite(1, 10, "call of duty").unwrap();
    let notifier = fixture.notifier(Arc::new(DisabledRenderer), fast_config());

    notifier.notify(&diff_of(vec![campaign("c1", "COD")])).await;

    let sent = fixture.chat.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.mention_user_ids, vec![10]);
}

#[tokio::test]
async fn no_watchers_means_no_mentions_but_message_still_sends() {
    let fixture = Fixture::new(vec![GuildInfo {
        id: 1,
        system_channel_id: Some(100),
    }]);
    let notifier = fixture.notifier(Arc::new(DisabledRenderer), fast_config());

    notifier.notify(&diff_of(vec![campaign("c1", "Valorant")])).await;

    let sent = fixture.chat.sent.lock();
    assert_eq!(sent.len(), 1);
    let (_, message) = &sent[0];
    assert_eq!(message.content, None);
    assert!(message.mention_user_ids.is_empty());
}

#[tokio::test]
async fn disabled_renderer_falls_back_to_benefit_image() {
    let fixture = Fixture::new(vec![GuildInfo {
        id: 1,
        system_channel_id: Some(100),
    }]);
    let notifier = fixture.notifier(Arc::new(DisabledRenderer), fast_config());

    notifier.notify(&diff_of(vec![campaign("c1", "Valorant")])).await;

    let sent = fixture.chat.sent.lock();
    let (_, message) = &sent[0];
    assert!(message.attachment.is_none());
    let image = message.embeds[0].image.as_ref().expect("fallback image");
    assert_eq!(image.url, "https://img/benefit");
}

#[tokio::test]
async fn attachment_budget_caps_renders_across_campaigns() {
    let fixture = Fixture::new(vec![GuildInfo {
        id: 1,
        system_channel_id: Some(100),
    }]);
    let notifier = fixture.notifier(Arc::new(FixedRenderer), fast_config());

    notifier
        .notify(&diff_of(vec![
            campaign("c1", "Valorant"),
            campaign("c2", "Rust"),
        ]))
        .await;

    let sent = fixture.chat.sent.lock();
    assert_eq!(sent.len(), 2);
    // Default budget is one collage per notify call; the second campaign uses
    // the raw-image fallback.
    let first = &sent[0].1;
    assert_eq!(
        first.attachment.as_ref().map(|a| a.filename.as_str()),
        Some("c1.png")
    );
    assert_eq!(
        first.embeds[0].image.as_ref().map(|i| i.url.as_str()),
        Some("attachment://c1.png")
    );
    let second = &sent[1].1;
    assert!(second.attachment.is_none());
    assert_eq!(
        second.embeds[0].image.as_ref().map(|i| i.url.as_str()),
        Some("https://img/benefit")
    );
}

#[tokio::test]
async fn unbounded_attachment_budget_renders_every_campaign() {
    let fixture = Fixture::new(vec![GuildInfo {
        id: 1,
        system_channel_id: Some(100),
    }]);
    let config = NotifierConfig {
        max_attachments: 0,
        ..fast_config()
    };
    let notifier = fixture.notifier(Arc::new(FixedRenderer), config);

    notifier
        .notify(&diff_of(vec![
            campaign("c1", "Valorant"),
            campaign("c2", "Rust"),
        ]))
        .await;

    let sent = fixture.chat.sent.lock();
    assert!(sent.iter().all(|(_, m)| m.attachment.is_some()));
}

#[tokio::test]
async fn failed_send_does_not_abort_remaining_targets() {
    let dir = tempfile::tempdir().unwrap();
    let chat = Arc::new(RecordingChat {
        guilds: vec![
            GuildInfo {
                id: 1,
                system_channel_id: Some(100),
            },
            GuildInfo {
                id: 2,
                system_channel_id: Some(200),
            },
        ],
        fail_channels: vec![100],
        ..Default::default()
    });
    let notifier = DropsNotifier::new(
        chat.clone(),
        Arc::new(GuildConfigStore::new(dir.path().join("guild.json"))),
        Arc::new(FavoritesStore::new(dir.path().join("favorites.json"))),
        Arc::new(GameCatalog::new(dir.path().join("catalog.json"))),
        Arc::new(DisabledRenderer),
        fast_config(),
    );

    notifier.notify(&diff_of(vec![campaign("c1", "Valorant")])).await;

    let sent = chat.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 200);
}

#[tokio::test]
async fn rate_limit_pause_only_runs_between_sends() {
    let fixture = Fixture::new(vec![GuildInfo {
        id: 1,
        system_channel_id: Some(100),
    }]);
    // A delay far beyond the timeout below: a single-message notify must
    // finish without ever sleeping.
    let config = NotifierConfig {
        send_delay: Duration::from_secs(60),
        ..NotifierConfig::default()
    };
    let notifier = fixture.notifier(Arc::new(DisabledRenderer), config);

    tokio::time::timeout(
        Duration::from_secs(5),
        notifier.notify(&diff_of(vec![campaign("c1", "Valorant")])),
    )
    .await
    .expect("single send must not wait out the rate-limit delay");

    assert_eq!(fixture.chat.sent.lock().len(), 1);
}

#[test]
fn join_mentions_respects_the_budget() {
    let ids: Vec<u64> = (100_000_000_000_000_000..100_000_000_000_000_200).collect();
    let (text, included) = join_mentions(&ids, MENTION_BUDGET);
    assert!(text.chars().count() <= MENTION_BUDGET);
    assert!(included.len() < ids.len());
    assert!(text.ends_with('…'));
    // Every included id appears as a token in the text, in order.
    let tokens: Vec<String> = included.iter().map(|id| format!("<@{id}>")).collect();
    assert_eq!(text.trim_end_matches('…'), tokens.join(" "));
}

#[test]
fn join_mentions_without_truncation_has_no_marker() {
    let (text, included) = join_mentions(&[10, 11, 12], MENTION_BUDGET);
    assert_eq!(text, "<@10> <@11> <@12>");
    assert_eq!(included, vec![10, 11, 12]);

    let (empty, none) = join_mentions(&[], MENTION_BUDGET);
    assert!(empty.is_empty());
    assert!(none.is_empty());
}
