//! Storage seam between the crawler/diff engine and the database layer.

use crate::error::{CoreError, Result};
use crate::snapshot::Snapshot;
use crate::types::{ItemId, TimeWindow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Timestamps written back to a watch entry after a successful crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchRunUpdate {
    last_run: DateTime<Utc>,
    next_due: DateTime<Utc>,
}

impl WatchRunUpdate {
    /// Build an update, enforcing that `next_due` is strictly after `last_run`.
    ///
    /// # Errors
    /// Returns `CoreError::Validation` if `next_due <= last_run`.
    pub fn new(last_run: DateTime<Utc>, next_due: DateTime<Utc>) -> Result<Self> {
        if next_due <= last_run {
            return Err(CoreError::Validation(format!(
                "next due {next_due} must be after last run {last_run}"
            )));
        }
        Ok(Self { last_run, next_due })
    }

    /// When the item was last crawled.
    #[must_use]
    pub fn last_run(&self) -> DateTime<Utc> {
        self.last_run
    }

    /// When the item is next due.
    #[must_use]
    pub fn next_due(&self) -> DateTime<Utc> {
        self.next_due
    }
}

/// Snapshot persistence consumed by the crawl task and the diff engine.
///
/// Implementations must be safe to share across concurrently running crawl
/// tasks.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Append one snapshot to the item's history.
    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Newest successful snapshot captured inside `window`.
    async fn load_snapshot_in_window(
        &self,
        item_id: &ItemId,
        window: &TimeWindow,
    ) -> Result<Option<Snapshot>>;

    /// All successful snapshots captured inside `window`, newest first.
    async fn load_snapshots_in_window(
        &self,
        item_id: &ItemId,
        window: &TimeWindow,
    ) -> Result<Vec<Snapshot>>;

    /// Advance the item's watch entry. Returns `false` if the item has no
    /// watch entry.
    async fn update_watch_entry(&self, item_id: &ItemId, update: WatchRunUpdate) -> Result<bool>;
}
