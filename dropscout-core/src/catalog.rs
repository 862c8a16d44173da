// src/catalog.rs
//
// Alias-resolving index of Twitch games. Merges the Helix `games/top` ranking
// with games observed on live campaigns and in the stored snapshot, and backs
// slash-command autocomplete and the notifier's favorite matching. A readiness
// gate keeps catalog-dependent commands paused until the index has content.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::CampaignRecord;
use crate::stores::Snapshot;
use crate::Error;

/// Weight class for games seen on a live campaign this run.
const WEIGHT_OBSERVED: i64 = 700;
/// Weight class for games only known from the historical snapshot.
const WEIGHT_HISTORY: i64 = 350;
/// Default page ceiling for the ranking-feed refresh.
const DEFAULT_MAX_PAGES: usize = 20;

/// Normalize game identifiers for consistent matching: casefold, collapse
/// whitespace and underscores to single spaces, trim. Two strings that
/// normalize equal are treated as the same game everywhere.
pub fn normalize(value: &str) -> String {
    value
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One known game in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEntry {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub twitch_id: Option<String>,
    #[serde(default)]
    pub box_art_url: Option<String>,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    games: Vec<GameEntry>,
}

/// One item from a ranking-feed page, already stripped to what the catalog
/// keeps.
#[derive(Debug, Clone)]
pub struct TopGame {
    pub id: Option<String>,
    pub name: String,
    pub box_art_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TopGamesPage {
    pub games: Vec<TopGame>,
    pub cursor: Option<String>,
}

/// Paginated "top games" listing, consumed one page at a time.
#[async_trait]
pub trait RankingFeed: Send + Sync {
    async fn top_games_page(&self, cursor: Option<&str>) -> Result<TopGamesPage, Error>;
}

#[derive(Default)]
struct Inner {
    games: HashMap<String, GameEntry>,
    alias_map: HashMap<String, String>,
}

/// Mutex-guarded catalog of game metadata with an async readiness gate.
pub struct GameCatalog {
    path: PathBuf,
    inner: Mutex<Inner>,
    ready_tx: watch::Sender<bool>,
}

impl GameCatalog {
    /// Open a catalog backed by `path`, loading any existing document. A
    /// missing or corrupt file yields an empty, not-ready catalog.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (ready_tx, _) = watch::channel(false);
        let catalog = Self {
            path,
            inner: Mutex::new(Inner::default()),
            ready_tx,
        };
        catalog.load_from_disk();
        catalog
    }

    fn load_from_disk(&self) {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return,
        };
        let doc: CatalogDocument = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Ignoring unparsable game catalog at {:?}: {}", self.path, e);
                return;
            }
        };
        let mut inner = self.inner.lock();
        for entry in doc.games {
            if entry.name.is_empty() && entry.key.is_empty() {
                continue;
            }
            let entry = normalize_entry(entry);
            inner.games.insert(entry.key.clone(), entry);
        }
        rebuild_alias_map(&mut inner);
    }

    // ------------------------------------------------------------------ //
    // Readiness gate
    // ------------------------------------------------------------------ //

    pub fn set_ready(&self, ready: bool) {
        self.ready_tx.send_replace(ready);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.subscribe().borrow()
    }

    /// Wait until the catalog is marked ready, up to `timeout`. Returns true
    /// if ready, false on timeout; never errors, so interactive callers can
    /// degrade to a "try again shortly" reply.
    pub async fn wait_ready(&self, timeout: Duration) -> bool {
        let mut rx = self.ready_tx.subscribe();
        if *rx.borrow() {
            return true;
        }
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await,
            Ok(Ok(_))
        )
    }

    // ------------------------------------------------------------------ //
    // Lookup
    // ------------------------------------------------------------------ //

    pub fn count(&self) -> usize {
        self.inner.lock().games.len()
    }

    /// Resolve free-form input to a catalog entry via the alias map. Returns
    /// a copy; callers never hold references into the index.
    pub fn get(&self, value: &str) -> Option<GameEntry> {
        if value.is_empty() {
            return None;
        }
        let key = normalize(value);
        let inner = self.inner.lock();
        let resolved = inner.alias_map.get(&key)?;
        inner.games.get(resolved).cloned()
    }

    /// All entries, best-ranked first.
    pub fn get_all(&self) -> Vec<GameEntry> {
        let inner = self.inner.lock();
        let mut entries: Vec<GameEntry> = inner.games.values().cloned().collect();
        entries.sort_by(compare_entries);
        entries
    }

    /// Rank entries for autocomplete. An empty query returns the top entries
    /// by weight; otherwise the score is weight plus a match bonus (500 exact
    /// alias, 320 alias prefix, 180 alias substring) and non-matches are
    /// excluded regardless of weight.
    pub fn search(&self, query: &str, limit: usize) -> Vec<GameEntry> {
        let normalized = normalize(query);
        let entries: Vec<GameEntry> = {
            let inner = self.inner.lock();
            inner.games.values().cloned().collect()
        };
        let mut scored: Vec<(i64, GameEntry)> = Vec::new();
        if normalized.is_empty() {
            for entry in entries {
                scored.push((entry.weight, entry));
            }
        } else {
            for entry in entries {
                let mut bonus = 0i64;
                for alias in std::iter::once(entry.key.as_str())
                    .chain(entry.aliases.iter().map(String::as_str))
                {
                    if alias == normalized {
                        bonus = bonus.max(500);
                    } else if alias.starts_with(&normalized) {
                        bonus = bonus.max(320);
                    } else if alias.contains(&normalized) {
                        bonus = bonus.max(180);
                    }
                }
                if bonus == 0 {
                    continue;
                }
                scored.push((entry.weight + bonus, entry));
            }
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| compare_entries(&a.1, &b.1)));
        scored.into_iter().take(limit).map(|(_, e)| e).collect()
    }

    /// Whether the campaign's game resolves to this entry, either directly
    /// through the entry's own aliases or through the global alias map.
    pub fn matches_campaign(&self, entry: &GameEntry, campaign: &CampaignRecord) -> bool {
        let target: HashSet<&str> = std::iter::once(entry.key.as_str())
            .chain(entry.aliases.iter().map(String::as_str))
            .collect();
        let name_key = normalize(campaign.game_name.as_deref().unwrap_or(""));
        let slug_key = normalize(campaign.game_slug.as_deref().unwrap_or(""));
        let inner = self.inner.lock();
        for candidate in [name_key, slug_key] {
            if candidate.is_empty() {
                continue;
            }
            if target.contains(candidate.as_str()) {
                return true;
            }
            if let Some(resolved) = inner.alias_map.get(&candidate) {
                return *resolved == entry.key;
            }
        }
        false
    }

    // ------------------------------------------------------------------ //
    // Mutation
    // ------------------------------------------------------------------ //

    /// Insert-or-merge the given entries. Returns true if anything changed;
    /// the alias map is rebuilt and the document persisted only in that case.
    pub fn merge_games(&self, entries: Vec<GameEntry>) -> Result<bool, Error> {
        if entries.is_empty() {
            return Ok(false);
        }
        let mut inner = self.inner.lock();
        let mut changed = false;
        for entry in entries {
            if entry.name.is_empty() && entry.key.is_empty() {
                continue;
            }
            let entry = normalize_entry(entry);
            match inner.games.entry(entry.key.clone()) {
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(entry);
                    changed = true;
                }
                std::collections::hash_map::Entry::Occupied(mut slot) => {
                    if merge_entry(slot.get_mut(), &entry) {
                        changed = true;
                    }
                }
            }
        }
        if changed {
            rebuild_alias_map(&mut inner);
            self.save_locked(&inner)?;
        }
        Ok(changed)
    }

    /// Seed entries from campaigns observed live this run (outranks history,
    /// ranks below the ranking feed's head).
    pub fn merge_from_campaigns(&self, campaigns: &[CampaignRecord]) -> Result<bool, Error> {
        let mut entries = Vec::new();
        for rec in campaigns {
            let name = rec.game_name.as_deref().unwrap_or("").trim();
            let slug = rec.game_slug.as_deref().filter(|s| !s.is_empty());
            if name.is_empty() && slug.is_none() {
                continue;
            }
            let display = if !name.is_empty() {
                name.to_string()
            } else {
                slug.unwrap_or("Twitch Game").to_string()
            };
            let key = normalize(&display);
            let mut aliases = vec![key.clone()];
            if let Some(slug) = slug {
                aliases.push(normalize(slug));
            }
            entries.push(GameEntry {
                key,
                name: display,
                slug: slug.map(str::to_string),
                twitch_id: None,
                box_art_url: rec.game_box_art.clone(),
                weight: WEIGHT_OBSERVED,
                aliases,
                sources: vec!["campaign".to_string()],
            });
        }
        self.merge_games(entries)
    }

    /// Seed entries from a historical snapshot document.
    pub fn merge_snapshot(&self, snapshot: &Snapshot) -> Result<bool, Error> {
        let mut entries = Vec::new();
        for item in snapshot.values() {
            let name = item.game_name.as_deref().unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }
            let key = normalize(name);
            entries.push(GameEntry {
                key: key.clone(),
                name: name.to_string(),
                slug: None,
                twitch_id: None,
                box_art_url: item.game_box_art.clone(),
                weight: WEIGHT_HISTORY,
                aliases: vec![key],
                sources: vec!["history".to_string()],
            });
        }
        self.merge_games(entries)
    }

    /// Seed from a snapshot file on disk; missing or unparsable files are a
    /// no-op, not an error.
    pub fn merge_snapshot_file(&self, path: &Path) -> Result<bool, Error> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Ok(false),
        };
        let snapshot: Snapshot = match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(_) => return Ok(false),
        };
        self.merge_snapshot(&snapshot)
    }

    /// Pull the ranking feed page by page and merge the results. Earlier
    /// ranks get strictly higher weights, floored at 100, so the head of the
    /// ranking always searches ahead of the tail. Returns how many entries
    /// the feed yielded.
    pub async fn refresh_top_games(
        &self,
        feed: &dyn RankingFeed,
        max_pages: Option<usize>,
    ) -> Result<usize, Error> {
        let page_limit = max_pages.unwrap_or(DEFAULT_MAX_PAGES);
        let mut entries: Vec<GameEntry> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut total = 0usize;
        let mut pages = 0usize;

        loop {
            let page = feed
                .top_games_page(cursor.as_deref())
                .await
                .map_err(|e| Error::CatalogUnavailable(e.to_string()))?;
            if page.games.is_empty() {
                break;
            }
            for (offset, item) in page.games.iter().enumerate() {
                let name = item.name.trim();
                if name.is_empty() {
                    continue;
                }
                let rank = (total + offset) as i64;
                let key = normalize(name);
                entries.push(GameEntry {
                    key: key.clone(),
                    name: name.to_string(),
                    slug: None,
                    twitch_id: item.id.clone().filter(|id| !id.is_empty()),
                    box_art_url: item.box_art_url.clone(),
                    weight: (1000 - rank).max(100),
                    aliases: vec![key],
                    sources: vec!["helix".to_string()],
                });
            }
            total += page.games.len();
            pages += 1;
            cursor = page.cursor.filter(|c| !c.is_empty());
            if cursor.is_none() || (page_limit > 0 && pages >= page_limit) {
                break;
            }
        }

        let fetched = entries.len();
        self.merge_games(entries)?;
        debug!("Ranking feed refresh merged {fetched} entries over {pages} page(s)");
        Ok(fetched)
    }

    /// Clear the catalog so it can be rebuilt: drops all entries, resets the
    /// ready flag, and persists an empty document.
    pub fn reset(&self) -> Result<(), Error> {
        self.set_ready(false);
        let mut inner = self.inner.lock();
        inner.games.clear();
        inner.alias_map.clear();
        self.save_locked(&inner)
    }

    fn save_locked(&self, inner: &Inner) -> Result<(), Error> {
        let mut games: Vec<GameEntry> = inner.games.values().cloned().collect();
        games.sort_by(compare_entries);
        for entry in &mut games {
            entry.aliases.sort();
            entry.sources.sort();
        }
        let json = serde_json::to_string_pretty(&CatalogDocument { games })?;
        crate::stores::write_atomic(&self.path, &json)
    }
}

/// Warm the catalog for this run: reset, seed from the snapshot history,
/// refresh the ranking feed, and flip the ready flag if anything landed.
/// Ranking-feed failures are logged and tolerated; history alone can still
/// make the catalog usable.
pub async fn warm_catalog(catalog: &GameCatalog, feed: &dyn RankingFeed, state_path: &Path) {
    if let Err(e) = catalog.reset() {
        warn!("Failed to reset game catalog: {e}");
    }
    let mut seeded = 0usize;
    match catalog.merge_snapshot_file(state_path) {
        Ok(true) => {
            seeded = catalog.count();
            info!("Seeded game catalog with {seeded} game(s) from campaign history");
        }
        Ok(false) => {}
        Err(e) => warn!("Failed to reuse campaign history for game catalog: {e}"),
    }
    match catalog.refresh_top_games(feed, None).await {
        Ok(fetched) => debug!("Ranking feed reported {fetched} game(s)"),
        Err(e) => warn!("Failed to refresh top games: {e}"),
    }
    let total = catalog.count();
    if total > 0 {
        catalog.set_ready(true);
        info!(
            "Game catalog ready: {total} unique game(s) ({seeded} from stored campaigns)"
        );
    } else {
        warn!("Game catalog empty; dependent commands stay gated until a refresh succeeds");
    }
}

fn compare_entries(a: &GameEntry, b: &GameEntry) -> std::cmp::Ordering {
    b.weight
        .cmp(&a.weight)
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.key.cmp(&b.key))
}

/// Canonicalize an incoming entry: derive the key, fold the slug and key into
/// the alias set, and drop the key itself from the aliases.
fn normalize_entry(mut entry: GameEntry) -> GameEntry {
    let key_source = if entry.key.is_empty() { &entry.name } else { &entry.key };
    entry.key = normalize(key_source);
    entry.name = entry.name.trim().to_string();
    if entry.name.is_empty() {
        entry.name = entry.key.clone();
    }
    let mut aliases: HashSet<String> = entry.aliases.iter().map(|a| normalize(a)).collect();
    if let Some(slug) = &entry.slug {
        aliases.insert(normalize(slug));
    }
    aliases.insert(entry.key.clone());
    let mut aliases: Vec<String> = aliases
        .into_iter()
        .filter(|a| !a.is_empty() && *a != entry.key)
        .collect();
    aliases.sort();
    entry.aliases = aliases;
    let mut sources: Vec<String> = entry
        .sources
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    sources.sort();
    entry.sources = sources;
    entry
}

/// Merge `incoming` into `current` (same key). Higher weight wins, longer
/// name wins, first-set wins for slug/twitch_id/box art, aliases and sources
/// union. Returns whether anything changed.
fn merge_entry(current: &mut GameEntry, incoming: &GameEntry) -> bool {
    let mut updated = false;
    if incoming.weight > current.weight {
        current.weight = incoming.weight;
        updated = true;
    }
    if !incoming.name.is_empty()
        && incoming.name != current.name
        && incoming.name.len() > current.name.len()
    {
        current.name = incoming.name.clone();
        updated = true;
    }
    if current.slug.is_none() && incoming.slug.is_some() {
        current.slug = incoming.slug.clone();
        updated = true;
    }
    if current.twitch_id.is_none() && incoming.twitch_id.is_some() {
        current.twitch_id = incoming.twitch_id.clone();
        updated = true;
    }
    if current.box_art_url.is_none() && incoming.box_art_url.is_some() {
        current.box_art_url = incoming.box_art_url.clone();
        updated = true;
    }
    let mut combined: HashSet<String> = current.aliases.iter().cloned().collect();
    for alias in &incoming.aliases {
        let alias = normalize(alias);
        if !alias.is_empty() && alias != current.key && combined.insert(alias) {
            updated = true;
        }
    }
    let mut aliases: Vec<String> = combined.into_iter().collect();
    aliases.sort();
    current.aliases = aliases;
    let mut sources: HashSet<String> = current.sources.iter().cloned().collect();
    for src in &incoming.sources {
        if !src.is_empty() && sources.insert(src.clone()) {
            updated = true;
        }
    }
    let mut sources: Vec<String> = sources.into_iter().collect();
    sources.sort();
    current.sources = sources;
    updated
}

fn rebuild_alias_map(inner: &mut Inner) {
    let mut alias_map = HashMap::new();
    for (key, entry) in &inner.games {
        alias_map.insert(key.clone(), key.clone());
        for alias in &entry.aliases {
            alias_map.insert(alias.clone(), key.clone());
        }
    }
    inner.alias_map = alias_map;
}
