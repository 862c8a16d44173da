// src/monitor.rs
//
// Long-lived background loop: fetch → diff → notify → persist on a fixed
// interval, resilient to any per-cycle failure.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog::GameCatalog;
use crate::differ::{diff, DropsDiff};
use crate::fetcher::DropsFetcher;
use crate::notifier::DropsNotifier;
use crate::stores::{Snapshot, SnapshotStore};
use crate::Error;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    /// Whether the very first cycle after start may notify. Off by default so
    /// a restart never replays alerts for campaigns that activated while the
    /// bot was down.
    pub notify_on_boot: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            notify_on_boot: false,
        }
    }
}

/// Periodically polls Twitch data and notifies on changes. `start` and
/// `stop` are both idempotent.
pub struct DropsMonitor {
    fetcher: Arc<DropsFetcher>,
    notifier: Arc<DropsNotifier>,
    store: Arc<SnapshotStore>,
    catalog: Option<Arc<GameCatalog>>,
    config: MonitorConfig,
    running: Mutex<Option<(JoinHandle<()>, CancellationToken)>>,
}

impl DropsMonitor {
    pub fn new(
        fetcher: Arc<DropsFetcher>,
        notifier: Arc<DropsNotifier>,
        store: Arc<SnapshotStore>,
        catalog: Option<Arc<GameCatalog>>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            store,
            catalog,
            config,
            running: Mutex::new(None),
        }
    }

    /// Start the monitoring task if it is not already running.
    pub fn start(&self) {
        let mut slot = self.running.lock();
        if let Some((handle, _)) = slot.as_ref() {
            if !handle.is_finished() {
                return;
            }
        }
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.fetcher.clone(),
            self.notifier.clone(),
            self.store.clone(),
            self.catalog.clone(),
            self.config.clone(),
            token.clone(),
        ));
        info!(
            "Drops monitor started (interval {:?}, notify_on_boot={})",
            self.config.interval, self.config.notify_on_boot
        );
        *slot = Some((handle, token));
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|(handle, _)| !handle.is_finished())
    }

    /// Cancel and await the monitoring task if running.
    pub async fn stop(&self) {
        let taken = self.running.lock().take();
        let Some((handle, token)) = taken else {
            return;
        };
        token.cancel();
        if let Err(e) = handle.await {
            if !e.is_cancelled() {
                warn!("Drops monitor task ended abnormally: {e}");
            }
        }
        info!("Drops monitor stopped");
    }
}

async fn run_loop(
    fetcher: Arc<DropsFetcher>,
    notifier: Arc<DropsNotifier>,
    store: Arc<SnapshotStore>,
    catalog: Option<Arc<GameCatalog>>,
    config: MonitorConfig,
    token: CancellationToken,
) {
    let mut prev = store.load();
    if let Some(catalog) = &catalog {
        // Best-effort seed so alias resolution works before the first
        // ranking-feed refresh lands.
        if let Err(e) = catalog.merge_snapshot(&prev) {
            warn!("Failed to seed game catalog from snapshot: {e}");
        }
    }
    let mut first_run = true;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            result = run_cycle(&fetcher, &notifier, &store, &mut prev, &mut first_run, config.notify_on_boot) => {
                match result {
                    Ok(diff) if !diff.is_empty() => {
                        info!("Cycle complete: {} campaign(s) newly active", diff.activated.len());
                    }
                    Ok(_) => debug!("Cycle complete: no activations"),
                    // Transient upstream failures are swallowed; the loop
                    // stays on schedule.
                    Err(e) => warn!("Monitor cycle failed: {e}"),
                }
            }
        }
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(config.interval) => {}
        }
    }
}

/// One fetch → diff → notify → persist cycle. The snapshot written is always
/// the one produced by the fetch in this same cycle, and becomes the baseline
/// only after it was persisted.
async fn run_cycle(
    fetcher: &DropsFetcher,
    notifier: &DropsNotifier,
    store: &SnapshotStore,
    prev: &mut Snapshot,
    first_run: &mut bool,
    notify_on_boot: bool,
) -> Result<DropsDiff, Error> {
    let curr = fetcher.fetch_condensed().await?;
    let changes = diff(prev, &curr);
    if !(*first_run && !notify_on_boot) {
        notifier.notify(&changes).await;
    }
    store.save(&curr)?;
    *prev = store.load();
    *first_run = false;
    Ok(changes)
}
