// src/stores/favorites.rs
//
// Per-user favorite games, stored per guild and keyed by the normalized game
// key from the catalog. Guarded by a store-wide lock so concurrent command
// handlers cannot interleave read-modify-write cycles.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::warn;

use crate::Error;

type Document = HashMap<String, HashMap<String, Vec<String>>>;

/// JSON-backed store for user favorite games per guild.
pub struct FavoritesStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FavoritesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load_unlocked(&self) -> Document {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Document::new(),
        };
        let parsed: Document = match serde_json::from_str(&raw) {
            Ok(data) => data,
            Err(e) => {
                warn!("Ignoring unparsable favorites at {:?}: {}", self.path, e);
                return Document::new();
            }
        };
        // Sanitize: drop blank/duplicate keys and empty containers.
        let mut result = Document::new();
        for (guild_id, users) in parsed {
            let mut guild_map: HashMap<String, Vec<String>> = HashMap::new();
            for (user_id, favorites) in users {
                let mut seen: HashSet<String> = HashSet::new();
                let mut unique: Vec<String> = Vec::new();
                for item in favorites {
                    let key = item.trim().to_string();
                    if key.is_empty() || !seen.insert(key.clone()) {
                        continue;
                    }
                    unique.push(key);
                }
                if !unique.is_empty() {
                    guild_map.insert(user_id, unique);
                }
            }
            if !guild_map.is_empty() {
                result.insert(guild_id, guild_map);
            }
        }
        result
    }

    fn save_unlocked(&self, data: &Document) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(data)?;
        super::write_atomic(&self.path, &json)
    }

    pub fn load(&self) -> Document {
        let _guard = self.lock.lock();
        self.load_unlocked()
    }

    /// Add a favorite. Returns true if the favorite was newly added, false if
    /// it was already present (or the key was blank).
    pub fn add_favorite(&self, guild_id: u64, user_id: u64, game_key: &str) -> Result<bool, Error> {
        let game_key = game_key.trim();
        if game_key.is_empty() {
            return Ok(false);
        }
        let _guard = self.lock.lock();
        let mut data = self.load_unlocked();
        let current = data
            .entry(guild_id.to_string())
            .or_default()
            .entry(user_id.to_string())
            .or_default();
        if current.iter().any(|item| item == game_key) {
            return Ok(false);
        }
        current.push(game_key.to_string());
        current.sort();
        self.save_unlocked(&data)?;
        Ok(true)
    }

    /// Remove one favorite. Empty user lists and guild maps are pruned so the
    /// document never accumulates dangling containers.
    pub fn remove_favorite(&self, guild_id: u64, user_id: u64, game_key: &str) -> Result<bool, Error> {
        let game_key = game_key.trim();
        if game_key.is_empty() {
            return Ok(false);
        }
        let _guard = self.lock.lock();
        let mut data = self.load_unlocked();
        let guild_key = guild_id.to_string();
        let user_key = user_id.to_string();
        let Some(guild_map) = data.get_mut(&guild_key) else {
            return Ok(false);
        };
        let Some(current) = guild_map.get_mut(&user_key) else {
            return Ok(false);
        };
        let before = current.len();
        current.retain(|item| item != game_key);
        if current.len() == before {
            return Ok(false);
        }
        if current.is_empty() {
            guild_map.remove(&user_key);
        }
        if guild_map.is_empty() {
            data.remove(&guild_key);
        }
        self.save_unlocked(&data)?;
        Ok(true)
    }

    /// Remove several favorites at once; returns how many were removed.
    pub fn remove_many<I, S>(&self, guild_id: u64, user_id: u64, game_keys: I) -> Result<usize, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: HashSet<String> = game_keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.lock();
        let mut data = self.load_unlocked();
        let guild_key = guild_id.to_string();
        let user_key = user_id.to_string();
        let Some(guild_map) = data.get_mut(&guild_key) else {
            return Ok(0);
        };
        let Some(current) = guild_map.get_mut(&user_key) else {
            return Ok(0);
        };
        let before = current.len();
        current.retain(|item| !keys.contains(item));
        let removed = before - current.len();
        if removed == 0 {
            return Ok(0);
        }
        if current.is_empty() {
            guild_map.remove(&user_key);
        }
        if guild_map.is_empty() {
            data.remove(&guild_key);
        }
        self.save_unlocked(&data)?;
        Ok(removed)
    }

    pub fn get_user_favorites(&self, guild_id: u64, user_id: u64) -> Vec<String> {
        self.load()
            .get(&guild_id.to_string())
            .and_then(|g| g.get(&user_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// All favorites in a guild, keyed by numeric user id. Entries with
    /// non-numeric user ids are skipped.
    pub fn get_guild_favorites(&self, guild_id: u64) -> HashMap<u64, HashSet<String>> {
        let data = self.load();
        let mut result = HashMap::new();
        if let Some(guild_map) = data.get(&guild_id.to_string()) {
            for (user_id, items) in guild_map {
                let Ok(uid) = user_id.parse::<u64>() else {
                    continue;
                };
                result.insert(uid, items.iter().cloned().collect());
            }
        }
        result
    }

    /// Users in the guild whose favorites intersect `keys`, mapped to the
    /// matched subset. Used by the notifier without exposing raw documents.
    pub fn get_watchers<I, S>(&self, guild_id: u64, keys: I) -> HashMap<u64, HashSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let target: HashSet<String> = keys
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        let mut result = HashMap::new();
        if target.is_empty() {
            return result;
        }
        for (uid, games) in self.get_guild_favorites(guild_id) {
            let matched: HashSet<String> = games.intersection(&target).cloned().collect();
            if !matched.is_empty() {
                result.insert(uid, matched);
            }
        }
        result
    }
}
