// src/cache.rs
//
// Small in-process caches used by the command layer: a short-TTL cache of the
// last condensed fetch, and a bounded token → page-session map for paginated
// favorite views.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::fetcher::DropsFetcher;
use crate::models::CampaignRecord;
use crate::Error;

/// Short-TTL cache over `DropsFetcher::fetch_condensed` so rapid command
/// invocations do not hammer the upstream feed. The lock is never held across
/// the fetch await, so concurrent refreshes on expiry can race; last writer
/// wins and correctness does not depend on exactly-once refresh.
pub struct CampaignCache {
    fetcher: Arc<DropsFetcher>,
    ttl: Duration,
    state: Mutex<Option<(Instant, Vec<CampaignRecord>)>>,
}

impl CampaignCache {
    pub fn new(fetcher: Arc<DropsFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            state: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<Vec<CampaignRecord>, Error> {
        {
            let state = self.state.lock();
            if let Some((fetched_at, data)) = state.as_ref() {
                if !data.is_empty() && fetched_at.elapsed() < self.ttl {
                    return Ok(data.clone());
                }
            }
        }
        let data = self.fetcher.fetch_condensed().await?;
        *self.state.lock() = Some((Instant::now(), data.clone()));
        Ok(data)
    }

    pub fn invalidate(&self) {
        *self.state.lock() = None;
    }
}

/// Minimal resumable state behind an opaque pagination token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSession {
    pub game_key: String,
    pub user_id: u64,
}

const TOKEN_LEN: usize = 16;

/// Bounded token → session map for paged interaction responses. Capacity is
/// a hard invariant: inserting past it evicts the oldest session.
pub struct PageSessionCache {
    capacity: usize,
    inner: Mutex<SessionInner>,
}

#[derive(Default)]
struct SessionInner {
    sessions: HashMap<String, PageSession>,
    order: VecDeque<String>,
}

impl PageSessionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(SessionInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a session and return its opaque token.
    pub fn insert(&self, session: PageSession) -> String {
        let token: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        let mut inner = self.inner.lock();
        inner.sessions.insert(token.clone(), session);
        inner.order.push_back(token.clone());
        while inner.sessions.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.sessions.remove(&oldest);
            } else {
                break;
            }
        }
        token
    }

    pub fn get(&self, token: &str) -> Option<PageSession> {
        self.inner.lock().sessions.get(token).cloned()
    }

    pub fn remove(&self, token: &str) -> Option<PageSession> {
        let mut inner = self.inner.lock();
        inner.order.retain(|t| t != token);
        inner.sessions.remove(token)
    }
}
