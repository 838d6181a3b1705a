use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::contentful::{fetch_all, CatalogSource};
use crate::error::Result;
use crate::storage::Database;
use crate::sync::writer::upsert_many;
use crate::sync::{SyncRun, SyncStatus};

/// Single-flight coordinator for the Contentful -> SQLite products sync.
///
/// Timer ticks and manual triggers share one guard: while a run is in
/// progress every other trigger is rejected (not queued).
pub struct SyncScheduler {
    db: Database,
    source: Arc<dyn CatalogSource>,
    page_size: u32,
    running: AtomicBool,
}

/// Clears the running flag when dropped, on every exit path.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncScheduler {
    pub fn new(db: Database, source: Arc<dyn CatalogSource>, page_size: u32) -> Self {
        Self {
            db,
            source,
            page_size,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    /// Run the sync once. Never fails; the outcome is only logged.
    pub async fn sync_products(&self) {
        self.try_run().await;
    }

    /// Run the sync once and return what happened.
    pub async fn try_run(&self) -> SyncRun {
        let started_at = Utc::now();
        let Some(_guard) = self.try_acquire() else {
            log::warn!("Previous sync still running, skipping this execution");
            return SyncRun::overlapped(started_at);
        };

        let clock = Instant::now();
        let mut run = SyncRun::started(started_at);
        log::info!("Starting products sync from Contentful");

        let outcome = self.execute(&mut run).await;
        run.duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(()) if run.status == SyncStatus::Empty => {}
            Ok(()) => {
                log::info!(
                    "Products sync completed successfully. Processed {} items in {}ms (inserted {}, skipped {})",
                    run.fetched,
                    run.duration_ms,
                    run.inserted,
                    run.skipped
                );
            }
            Err(e) => {
                log::error!("Products sync failed after {}ms: {e}", run.duration_ms);
                run.status = SyncStatus::Failed;
                run.error = Some(e.to_string());
            }
        }
        run
    }

    async fn execute(&self, run: &mut SyncRun) -> Result<()> {
        let items = fetch_all(self.source.as_ref(), self.page_size).await?;
        run.fetched = items.len();

        if items.is_empty() {
            log::warn!("No products fetched from Contentful");
            run.status = SyncStatus::Empty;
            return Ok(());
        }

        let counts = upsert_many(&self.db, items).await?;
        run.inserted = counts.inserted;
        run.skipped = counts.skipped;
        Ok(())
    }

    /// Trigger [`Self::sync_products`] every `period` until `shutdown` resolves.
    ///
    /// Each run is spawned, so a slow run does not hold back the timer; the
    /// guard turns the overlapping ticks into logged skips. On shutdown the
    /// run still in flight, if any, is awaited before returning.
    pub async fn run_every(self: Arc<Self>, period: Duration, shutdown: impl Future<Output = ()>) {
        let Some(first_tick) = tokio::time::Instant::now().checked_add(period) else {
            log::error!(
                "Sync interval of {}s is out of range; scheduled sync disabled",
                period.as_secs()
            );
            return;
        };
        let mut ticker = tokio::time::interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut runs = JoinSet::new();
        log::info!("Sync scheduler started (every {}s)", period.as_secs_f64());
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    log::info!("Sync scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    while runs.try_join_next().is_some() {}
                    let scheduler = Arc::clone(&self);
                    runs.spawn(async move { scheduler.sync_products().await });
                }
            }
        }

        if self.is_running() {
            log::info!("Waiting for the in-flight sync to finish");
        }
        while let Some(joined) = runs.join_next().await {
            if let Err(e) = joined {
                log::error!("Sync task ended abnormally: {e}");
            }
        }
    }
}
