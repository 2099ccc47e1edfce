//! Crawl orchestrator tying the pool, storage, diffing and notification
//! together.
//!
//! The orchestrator owns the [`ProfilePool`] and receives every other
//! collaborator at construction: the snapshot store, the diff engine and the
//! notification dispatcher. A crawl that persists a successful snapshot is
//! immediately diffed; reportable changes go to the dispatcher, whose errors
//! are logged and never touch crawl accounting.

use crate::batch::run_chunked;
use crate::error::Result;
use crate::stats::BatchStats;
use crate::task::{crawl_item, CrawlOutcome, WorkItem};
use chrono::{DateTime, Utc};
use pricewatch_browser::{Extractor, PortAllocator, ProfilePool};
use pricewatch_core::{AppConfig, BatchConfig, ItemId, Snapshot, SnapshotStore, TimeWindow};
use pricewatch_diff::{ChangeResult, DiffEngine, HistoryEntry};
use pricewatch_notify::NotificationDispatcher;
use pricewatch_scheduler::WatchEntry;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs crawls over a bounded pool of sessions.
pub struct CrawlOrchestrator<E: Extractor> {
    pool: ProfilePool<E>,
    store: Arc<dyn SnapshotStore>,
    diff: DiffEngine,
    dispatcher: Arc<dyn NotificationDispatcher>,
    batch_size: usize,
    pacing: Duration,
    cancel: CancellationToken,
}

impl<E: Extractor> CrawlOrchestrator<E> {
    /// Create an orchestrator with default diff settings and batch pacing.
    pub fn new(
        pool: ProfilePool<E>,
        store: Arc<dyn SnapshotStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let batch = BatchConfig::default();
        Self {
            pool,
            diff: DiffEngine::new(Arc::clone(&store)),
            store,
            dispatcher,
            batch_size: batch.batch_size,
            pacing: batch.pacing_delay(),
            cancel: CancellationToken::new(),
        }
    }

    /// Build the pool, port allocator and diff engine from configuration.
    ///
    /// # Errors
    /// Returns an error if a diff threshold override is invalid.
    pub fn from_config(
        extractor: Arc<E>,
        store: Arc<dyn SnapshotStore>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: &AppConfig,
    ) -> Result<Self> {
        let ports = Arc::new(PortAllocator::new(
            config.pool.port_start,
            config.pool.port_end,
        ));
        let pool = ProfilePool::new(extractor, ports, config.pool.capacity);
        let diff = DiffEngine::from_config(Arc::clone(&store), &config.diff)?;

        Ok(Self {
            diff,
            batch_size: config.batch.batch_size,
            pacing: config.batch.pacing_delay(),
            ..Self::new(pool, store, dispatcher)
        })
    }

    /// Replace the diff engine (custom registry or significance filter).
    #[must_use]
    pub fn with_diff_engine(mut self, diff: DiffEngine) -> Self {
        self.diff = diff;
        self
    }

    /// Set the default batch size and pacing used by [`Self::run_due`].
    #[must_use]
    pub fn with_batching(mut self, batch_size: usize, pacing: Duration) -> Self {
        self.batch_size = batch_size;
        self.pacing = pacing;
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops a running batch at its next chunk boundary.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The session pool.
    pub fn pool(&self) -> &ProfilePool<E> {
        &self.pool
    }

    /// The diff engine.
    pub fn diff_engine(&self) -> &DiffEngine {
        &self.diff
    }

    /// Crawl `items` in chunks of `batch_size`, pausing `pacing` between
    /// chunks. The pool is always drained afterwards.
    ///
    /// # Errors
    /// Returns an error only for an invalid batch size; item failures are
    /// counted in the stats.
    pub async fn run_batch(
        &self,
        items: Vec<WorkItem>,
        batch_size: usize,
        pacing: Duration,
    ) -> Result<BatchStats> {
        tracing::info!(
            "Starting crawl run: {} items, batch size {}, pacing {:?}",
            items.len(),
            batch_size,
            pacing
        );

        let result = run_chunked(
            &items,
            batch_size,
            pacing,
            self.pool.capacity(),
            &self.cancel,
            |item, profile_id| self.crawl_and_report(item, profile_id),
        )
        .await;

        self.pool.cleanup_all().await;

        let stats = result?;
        stats.log_summary();
        Ok(stats)
    }

    /// Crawl every entry due at `now` with the configured batching.
    ///
    /// # Errors
    /// See [`Self::run_batch`].
    pub async fn run_due(&self, entries: &[WatchEntry], now: DateTime<Utc>) -> Result<BatchStats> {
        let items: Vec<WorkItem> = entries
            .iter()
            .filter(|entry| entry.is_due_at(now))
            .map(WorkItem::from)
            .collect();

        tracing::info!("{} of {} watched items due", items.len(), entries.len());
        self.run_batch(items, self.batch_size, self.pacing).await
    }

    /// Crawl a single item on profile 0, diffing and notifying on success.
    ///
    /// The session stays resident; call [`Self::shutdown`] when done.
    pub async fn crawl_one(&self, item: WorkItem) -> CrawlOutcome {
        self.crawl_and_report(item, 0).await
    }

    /// Compare the item's newest snapshot against the prior window.
    ///
    /// # Errors
    /// Returns an error if snapshots cannot be loaded.
    pub async fn diff(&self, item_id: &ItemId) -> Result<ChangeResult> {
        Ok(self.diff.diff(item_id).await?)
    }

    /// Change history of the item inside `window`, newest first.
    ///
    /// # Errors
    /// Returns an error if snapshots cannot be loaded.
    pub async fn get_history(
        &self,
        item_id: &ItemId,
        window: &TimeWindow,
    ) -> Result<Vec<HistoryEntry>> {
        Ok(self.diff.get_history(item_id, window).await?)
    }

    /// Close every resident session. Returns the number closed.
    pub async fn shutdown(&self) -> usize {
        self.pool.cleanup_all().await
    }

    async fn crawl_and_report(&self, item: WorkItem, profile_id: usize) -> CrawlOutcome {
        let mut outcome = crawl_item(&self.pool, self.store.as_ref(), &item, profile_id).await;
        if let Some(snapshot) = &outcome.snapshot {
            outcome.changes = self.report_changes(&item.item_id, snapshot).await;
        }
        outcome
    }

    /// Diff the fresh snapshot and hand any changes to the dispatcher.
    /// Returns the number of changed fields.
    async fn report_changes(&self, item_id: &ItemId, latest: &Snapshot) -> usize {
        match self.diff.diff(item_id).await {
            Ok(ChangeResult::Changed(changes)) => {
                tracing::info!("{} changed in {} fields", item_id, changes.len());
                if let Err(e) = self.dispatcher.notify(item_id, &changes, latest).await {
                    tracing::error!("Notification for {} failed: {}", item_id, e);
                }
                changes.len()
            }
            Ok(ChangeResult::NoChange) => {
                tracing::debug!("{} unchanged", item_id);
                0
            }
            Ok(ChangeResult::FirstObservation) => {
                tracing::info!("First observation of {}", item_id);
                0
            }
            Err(e) => {
                tracing::error!("Diff for {} failed: {}", item_id, e);
                0
            }
        }
    }
}
