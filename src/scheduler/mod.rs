//! Scheduler module for running check cycles and maintaining history.

mod cache;
mod fleet;
mod health;
mod retention;
mod rollup;

pub use cache::*;
pub use fleet::*;
pub use health::*;
pub use retention::*;
pub use rollup::*;

use crate::db::{CheckResult, SiteHistory, StatusDocument, StatusSnapshot, Store, StoreError, Target};
use crate::probe::Prober;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};

/// Check cycle error types.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("failed to persist status document: {0}")]
    Persist(#[from] StoreError),
    #[error("document task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// `round(numerator / denominator)` with halves rounded up.
pub(crate) fn round_div(numerator: u64, denominator: u64) -> u64 {
    (2 * numerator + denominator) / (2 * denominator)
}

/// Runs check cycles against the configured targets.
///
/// Cycles are serialized: at most one runs at a time. Each cycle starts from
/// the document on disk, so saves by other writers (a `check` run next to the
/// server) are folded in rather than overwritten.
pub struct Monitor {
    targets: Vec<Target>,
    prober: Prober,
    store: Arc<Store>,
    policy: RetentionPolicy,
    cycle_lock: Mutex<()>,
    /// Merged document whose save failed; the next cycle starts from it.
    pending: RwLock<Option<StatusDocument>>,
    cache: RwLock<StatusCache>,
}

impl Monitor {
    pub fn new(
        targets: Vec<Target>,
        prober: Prober,
        store: Arc<Store>,
        policy: RetentionPolicy,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            targets,
            prober,
            store,
            policy,
            cycle_lock: Mutex::new(()),
            pending: RwLock::new(None),
            cache: RwLock::new(StatusCache::new(cache_ttl)),
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn find_target(&self, id: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// Run one full cycle: probe, aggregate, merge history, persist.
    ///
    /// A persistence failure is returned, but the new results stay in the
    /// cache and in a pending document, so the next cycle writes them.
    pub async fn run_cycle(&self) -> Result<StatusSnapshot, CycleError> {
        let _cycle = self.cycle_lock.lock().await;
        self.cycle_locked().await
    }

    /// Current status of all targets, from the cache while it is fresh.
    ///
    /// `force` bypasses and invalidates the cache. Requests that queue up
    /// behind a running cycle reuse its results instead of starting another.
    pub async fn current_status(&self, force: bool) -> Result<StatusSnapshot, CycleError> {
        if !force {
            if let Some(snapshot) = self.cache.read().await.fresh() {
                return Ok(snapshot.clone());
            }
        }

        let _cycle = self.cycle_lock.lock().await;

        if force {
            self.cache.write().await.invalidate();
        } else if let Some(snapshot) = self.cache.read().await.fresh() {
            return Ok(snapshot.clone());
        }

        self.cycle_locked().await
    }

    /// Status of one target, or `None` if no such target is configured.
    ///
    /// Served from the cache while fresh; otherwise the target is probed on
    /// its own. Single-target probes do not touch the history.
    pub async fn site_status(&self, id: &str, force: bool) -> Option<CheckResult> {
        let target = self.find_target(id)?;

        if !force {
            if let Some(result) = self.cache.read().await.fresh_site(id) {
                return Some(result.clone());
            }
        }

        Some(self.prober.probe(target).await)
    }

    /// History of one target, or `None` if no such target is configured.
    ///
    /// Reads the same document the next cycle will start from.
    pub async fn site_history(&self, id: &str) -> Option<SiteHistory> {
        let target = self.find_target(id)?;

        if let Some(doc) = self.pending.read().await.as_ref() {
            return Some(doc.historical.site_history(&target.id));
        }

        let doc = match self.load_document().await {
            Ok(doc) => doc,
            Err(e) => {
                tracing::error!("Failed to load status document: {}", e);
                StatusDocument::default()
            }
        };
        Some(doc.historical.site_history(&target.id))
    }

    async fn load_document(&self) -> Result<StatusDocument, CycleError> {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || store.load()).await?)
    }

    /// Must be called with `cycle_lock` held.
    async fn cycle_locked(&self) -> Result<StatusSnapshot, CycleError> {
        let results = check_all(&self.prober, &self.targets).await;
        let now = Utc::now();
        let metrics = aggregate(&results);

        tracing::info!(
            "Cycle complete: {} ({}% of {} operational, avg {}ms)",
            metrics.status,
            metrics.operational_percentage,
            metrics.total_sites,
            metrics.average_response_time
        );
        for issue in &metrics.sites_with_issues {
            tracing::info!("  {} is {}: {}", issue.id, issue.status, issue.status_text);
        }

        let snapshot = StatusSnapshot {
            metrics: metrics.clone(),
            sites: results.clone(),
            last_checked: now,
        };

        self.cache.write().await.store(snapshot.clone());

        let mut pending = self.pending.write().await;
        let mut doc = match pending.take() {
            Some(doc) => doc,
            None => self.load_document().await?,
        };
        doc.apply_cycle(results, metrics, now, &self.policy);

        let store = self.store.clone();
        let (doc, saved) = tokio::task::spawn_blocking(move || {
            let saved = store.save(&doc);
            (doc, saved)
        })
        .await?;

        if let Err(e) = saved {
            tracing::error!("Failed to save status document: {}", e);
            *pending = Some(doc);
            return Err(e.into());
        }

        Ok(snapshot)
    }
}

/// Runs a check cycle on a fixed interval in the background.
pub struct Scheduler {
    monitor: Arc<Monitor>,
    interval: Duration,
    stop: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl Scheduler {
    pub fn new(monitor: Arc<Monitor>, interval: Duration) -> Self {
        Self {
            monitor,
            interval,
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the background task. The first cycle runs immediately.
    pub async fn start(&self) {
        if self.interval.is_zero() {
            tracing::info!("Scheduler: background checks disabled");
            return;
        }

        let (tx, mut rx) = broadcast::channel(1);
        *self.stop.lock().await = Some(tx);

        let monitor = self.monitor.clone();
        let period = self.interval;

        tracing::info!(
            "Scheduler: checking {} targets every {:?}",
            monitor.targets().len(),
            period
        );

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = rx.recv() => break,
                    _ = interval.tick() => {
                        if let Err(e) = monitor.run_cycle().await {
                            tracing::error!("Scheduler: cycle failed: {}", e);
                        }
                    }
                }
            }
        });
    }

    /// Stop the background task.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}
