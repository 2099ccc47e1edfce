//! Pricewatch Database Layer
//!
//! Provides `SQLite` storage for the watch-list and the snapshot history.
//! Uses `SQLx` with embedded migrations.
//!
//! # Example
//!
//! ```ignore
//! use pricewatch_db::Database;
//!
//! let db = Database::new("pricewatch.db").await?;
//! db.run_migrations().await?;
//! ```
//!
//! # Design Principles
//!
//! - Snapshots are append-only; watch entries are never hard-deleted
//! - Timestamps are stored as fixed-width RFC 3339 UTC text, so string
//!   comparison in SQL matches chronological order
//! - [`Database`] implements [`SnapshotStore`] for the crawler and diff engine

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod migrations;
pub mod snapshots;
pub mod watchlist;

pub use connection::DbPool;
pub use error::{DatabaseError, Result};
pub use watchlist::EnrollOutcome;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pricewatch_core::{ItemId, Snapshot, SnapshotStore, TimeWindow, WatchRunUpdate};
use pricewatch_scheduler::{Cadence, WatchEntry};
use std::path::Path;

/// High-level database interface with migrations.
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open the database at `path` (or `:memory:`).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = DbPool::new(path).await?;
        Ok(Self { pool })
    }

    /// Open the database and bring the schema up to date.
    ///
    /// # Errors
    /// Returns `DatabaseError` if opening or migrating fails.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Self::new(path).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(self.pool.pool()).await
    }

    /// Get the current schema version.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(self.pool.pool()).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        self.pool.pool()
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Enroll an item in the watch-list.
    pub async fn enroll(
        &self,
        item_id: &ItemId,
        cadence: Cadence,
        note: Option<&str>,
    ) -> Result<EnrollOutcome> {
        watchlist::enroll(self.pool(), item_id, cadence, note).await
    }

    /// Soft-delete an item from the watch-list.
    pub async fn deactivate(&self, item_id: &ItemId) -> Result<bool> {
        watchlist::set_active(self.pool(), item_id, false).await
    }

    /// Pause monitoring of an item.
    pub async fn pause(&self, item_id: &ItemId) -> Result<bool> {
        watchlist::set_active(self.pool(), item_id, false).await
    }

    /// Resume monitoring of a paused item.
    pub async fn resume(&self, item_id: &ItemId) -> Result<bool> {
        watchlist::set_active(self.pool(), item_id, true).await
    }

    /// Look up one watch entry.
    pub async fn watch_entry(&self, item_id: &ItemId) -> Result<Option<WatchEntry>> {
        watchlist::get_entry(self.pool(), item_id).await
    }

    /// Every watch entry.
    pub async fn watch_entries(&self) -> Result<Vec<WatchEntry>> {
        watchlist::list_entries(self.pool()).await
    }

    /// Active entries due at `now`.
    pub async fn due_entries(&self, now: DateTime<Utc>) -> Result<Vec<WatchEntry>> {
        watchlist::list_due(self.pool(), now).await
    }

    /// Recent snapshots for an item, failed ones included, newest first.
    pub async fn recent_snapshots(&self, item_id: &ItemId, limit: u32) -> Result<Vec<Snapshot>> {
        snapshots::list_for_item(self.pool(), item_id, limit).await
    }
}

#[async_trait]
impl SnapshotStore for Database {
    async fn save_snapshot(&self, snapshot: &Snapshot) -> pricewatch_core::Result<()> {
        Ok(snapshots::insert_snapshot(self.pool(), snapshot).await?)
    }

    async fn load_snapshot_in_window(
        &self,
        item_id: &ItemId,
        window: &TimeWindow,
    ) -> pricewatch_core::Result<Option<Snapshot>> {
        let mut found = snapshots::successful_in_window(self.pool(), item_id, window, Some(1)).await?;
        Ok(found.pop())
    }

    async fn load_snapshots_in_window(
        &self,
        item_id: &ItemId,
        window: &TimeWindow,
    ) -> pricewatch_core::Result<Vec<Snapshot>> {
        Ok(snapshots::successful_in_window(self.pool(), item_id, window, None).await?)
    }

    async fn update_watch_entry(
        &self,
        item_id: &ItemId,
        update: WatchRunUpdate,
    ) -> pricewatch_core::Result<bool> {
        Ok(watchlist::record_run(self.pool(), item_id, update).await?)
    }
}

/// Fixed-width UTC timestamp; lexicographic order equals time order.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("invalid timestamp '{value}': {e}")))
}
