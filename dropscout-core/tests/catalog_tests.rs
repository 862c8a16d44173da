// dropscout-core/tests/catalog_tests.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dropscout_core::catalog::{
    normalize, GameCatalog, GameEntry, RankingFeed, TopGame, TopGamesPage,
};
use dropscout_core::models::CampaignRecord;
use dropscout_core::Error;
use parking_lot::Mutex;

fn catalog_in(dir: &tempfile::TempDir) -> GameCatalog {
    GameCatalog::new(dir.path().join("catalog.json"))
}

fn entry(key: &str, name: &str, weight: i64) -> GameEntry {
    GameEntry {
        key: key.to_string(),
        name: name.to_string(),
        weight,
        aliases: vec![key.to_string()],
        sources: vec!["seed".to_string()],
        ..Default::default()
    }
}

#[test]
fn normalization_folds_case_whitespace_and_underscores() {
    let a = normalize("Call of Duty");
    let b = normalize("  call   of_duty ");
    let c = normalize("CALL OF DUTY");
    assert_eq!(a, "call of duty");
    assert_eq!(a, b);
    assert_eq!(a, c);
}

#[test]
fn get_resolves_any_normalized_form() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    catalog
        .merge_games(vec![entry("call of duty", "Call of Duty", 500)])
        .unwrap();
    for query in ["Call of Duty", "  call   of_duty ", "CALL OF DUTY"] {
        let resolved = catalog.get(query).expect("should resolve");
        assert_eq!(resolved.key, "call of duty");
    }
    assert!(catalog.get("unknown game").is_none());
}

#[test]
fn merge_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    let game = entry("valorant", "Valorant", 500);
    assert!(catalog.merge_games(vec![game.clone()]).unwrap());
    assert!(!catalog.merge_games(vec![game]).unwrap());
}

#[test]
fn merge_keeps_max_weight_and_unions_sources() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    let mut low = entry("valorant", "Valorant", 100);
    low.sources = vec!["history".to_string()];
    let mut high = entry("valorant", "Valorant", 250);
    high.sources = vec!["helix".to_string()];

    catalog.merge_games(vec![low]).unwrap();
    catalog.merge_games(vec![high]).unwrap();
    // A later lower weight must not regress the entry.
    catalog.merge_games(vec![entry("valorant", "Valorant", 50)]).unwrap();

    let merged = catalog.get("valorant").unwrap();
    assert_eq!(merged.weight, 250);
    assert_eq!(merged.sources, vec!["helix", "history", "seed"]);
}

#[test]
fn merge_prefers_longer_names_and_first_set_fields() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    let mut first = entry("valorant", "Valorant", 100);
    first.box_art_url = Some("https://img/1".to_string());
    let mut second = entry("valorant", "Valorant (Riot Games)", 100);
    second.box_art_url = Some("https://img/2".to_string());
    second.slug = Some("valorant".to_string());

    catalog.merge_games(vec![first]).unwrap();
    catalog.merge_games(vec![second]).unwrap();

    let merged = catalog.get("valorant").unwrap();
    assert_eq!(merged.name, "Valorant (Riot Games)");
    assert_eq!(merged.box_art_url.as_deref(), Some("https://img/1"));
    assert_eq!(merged.slug.as_deref(), Some("valorant"));
}

#[test]
fn search_excludes_non_matches_regardless_of_weight() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    catalog
        .merge_games(vec![
            entry("valorant", "Valorant", 500),
            entry("apex legends", "Apex Legends", 9999),
        ])
        .unwrap();

    let results = catalog.search("val", 25);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].key, "valorant");
}

#[test]
fn search_ranks_exact_above_prefix_above_substring() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    catalog
        .merge_games(vec![
            entry("rust", "Rust", 100),
            entry("rustler", "Rustler", 100),
            entry("trust fall", "Trust Fall", 100),
        ])
        .unwrap();
    let keys: Vec<String> = catalog
        .search("rust", 25)
        .into_iter()
        .map(|e| e.key)
        .collect();
    assert_eq!(keys, vec!["rust", "rustler", "trust fall"]);
}

#[test]
fn empty_query_returns_top_by_weight() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    catalog
        .merge_games(vec![
            entry("a", "Alpha", 10),
            entry("b", "Beta", 30),
            entry("c", "Gamma", 20),
        ])
        .unwrap();
    let keys: Vec<String> = catalog.search("", 2).into_iter().map(|e| e.key).collect();
    assert_eq!(keys, vec!["b", "c"]);
}

#[test]
fn matches_campaign_through_aliases() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    let mut game = entry("valorant", "Valorant", 500);
    game.aliases.push("valo".to_string());
    catalog.merge_games(vec![game]).unwrap();

    let campaign = CampaignRecord {
        id: "c1".to_string(),
        name: "Valorant Drops".to_string(),
        status: "ACTIVE".to_string(),
        game_name: Some("VALORANT".to_string()),
        game_slug: Some("valorant".to_string()),
        game_box_art: None,
        starts_at: None,
        ends_at: None,
        benefits: vec![],
    };
    let game = catalog.get("valorant").unwrap();
    assert!(catalog.matches_campaign(&game, &campaign));

    let other = entry("apex legends", "Apex Legends", 100);
    catalog.merge_games(vec![other]).unwrap();
    let other = catalog.get("apex legends").unwrap();
    assert!(!catalog.matches_campaign(&other, &campaign));
}

#[test]
fn catalog_persists_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("catalog.json");
    {
        let catalog = GameCatalog::new(&path);
        catalog
            .merge_games(vec![entry("valorant", "Valorant", 500)])
            .unwrap();
    }
    let reloaded = GameCatalog::new(&path);
    assert_eq!(reloaded.count(), 1);
    assert!(reloaded.get("valorant").is_some());
    assert!(!reloaded.is_ready(), "readiness never persists across runs");
}

#[tokio::test]
async fn readiness_gate_times_out_then_opens() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(catalog_in(&dir));
    assert!(!catalog.wait_ready(Duration::from_millis(20)).await);

    let waiter = {
        let catalog = catalog.clone();
        tokio::spawn(async move { catalog.wait_ready(Duration::from_secs(5)).await })
    };
    catalog.set_ready(true);
    assert!(waiter.await.unwrap());
    assert!(catalog.is_ready());

    catalog.set_ready(false);
    assert!(!catalog.is_ready());
}

struct StubRankingFeed {
    pages: Mutex<Vec<TopGamesPage>>,
}

#[async_trait]
impl RankingFeed for StubRankingFeed {
    async fn top_games_page(&self, _cursor: Option<&str>) -> Result<TopGamesPage, Error> {
        let mut pages = self.pages.lock();
        if pages.is_empty() {
            Ok(TopGamesPage::default())
        } else {
            Ok(pages.remove(0))
        }
    }
}

fn top_game(name: &str) -> TopGame {
    TopGame {
        id: Some(format!("id-{name}")),
        name: name.to_string(),
        box_art_url: None,
    }
}

#[tokio::test]
async fn ranking_refresh_assigns_decreasing_weights_with_floor() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    let feed = StubRankingFeed {
        pages: Mutex::new(vec![
            TopGamesPage {
                games: vec![top_game("First Game"), top_game("Second Game")],
                cursor: Some("next".to_string()),
            },
            TopGamesPage {
                games: vec![top_game("Third Game")],
                cursor: None,
            },
        ]),
    };

    let fetched = catalog.refresh_top_games(&feed, None).await.unwrap();
    assert_eq!(fetched, 3);
    assert_eq!(catalog.get("first game").unwrap().weight, 1000);
    assert_eq!(catalog.get("second game").unwrap().weight, 999);
    assert_eq!(catalog.get("third game").unwrap().weight, 998);
    assert_eq!(catalog.get("first game").unwrap().sources, vec!["helix"]);
}

#[tokio::test]
async fn ranking_refresh_honors_page_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    // Every page advertises a cursor; only the ceiling can stop the loop.
    let pages: Vec<TopGamesPage> = (0..5)
        .map(|i| TopGamesPage {
            games: vec![top_game(&format!("Game {i}"))],
            cursor: Some("more".to_string()),
        })
        .collect();
    let feed = StubRankingFeed {
        pages: Mutex::new(pages),
    };
    let fetched = catalog.refresh_top_games(&feed, Some(2)).await.unwrap();
    assert_eq!(fetched, 2);
    assert_eq!(catalog.count(), 2);
}

#[tokio::test]
async fn ranking_weight_floor_collapses_deep_ranks() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    let games: Vec<TopGame> = (0..950).map(|i| top_game(&format!("Game {i}"))).collect();
    let feed = StubRankingFeed {
        pages: Mutex::new(vec![TopGamesPage { games, cursor: None }]),
    };
    catalog.refresh_top_games(&feed, None).await.unwrap();
    assert_eq!(catalog.get("game 0").unwrap().weight, 1000);
    assert_eq!(catalog.get("game 900").unwrap().weight, 100);
    assert_eq!(catalog.get("game 949").unwrap().weight, 100);
}

#[test]
fn reset_clears_entries_and_readiness() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);
    catalog
        .merge_games(vec![entry("valorant", "Valorant", 500)])
        .unwrap();
    catalog.set_ready(true);
    catalog.reset().unwrap();
    assert_eq!(catalog.count(), 0);
    assert!(!catalog.is_ready());
    assert!(catalog.get("valorant").is_none());
}

#[test]
fn snapshot_and_campaign_seeding_use_fixed_weight_classes() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog_in(&dir);

    let campaign = CampaignRecord {
        id: "c1".to_string(),
        name: "Drops".to_string(),
        status: "ACTIVE".to_string(),
        game_name: Some("Rust".to_string()),
        game_slug: Some("rust".to_string()),
        game_box_art: Some("https://img/rust".to_string()),
        starts_at: None,
        ends_at: None,
        benefits: vec![],
    };
    assert!(catalog.merge_from_campaigns(std::slice::from_ref(&campaign)).unwrap());
    let live = catalog.get("rust").unwrap();
    assert_eq!(live.weight, 700);
    assert_eq!(live.sources, vec!["campaign"]);

    let mut snapshot = dropscout_core::stores::Snapshot::new();
    snapshot.insert(
        "old".to_string(),
        dropscout_core::stores::SnapshotEntry {
            id: "old".to_string(),
            game_name: Some("Old Game".to_string()),
            ..Default::default()
        },
    );
    assert!(catalog.merge_snapshot(&snapshot).unwrap());
    let historical = catalog.get("old game").unwrap();
    assert_eq!(historical.weight, 350);
    assert_eq!(historical.sources, vec!["history"]);
}
