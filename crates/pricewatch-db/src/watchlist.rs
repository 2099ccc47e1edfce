//! Watch-list management.
//!
//! Entries are soft-deleted: removing or pausing an item clears its `active`
//! flag and keeps the row with its run history.

use crate::error::{DatabaseError, Result};
use crate::{format_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use pricewatch_core::{ItemId, WatchRunUpdate};
use pricewatch_scheduler::{Cadence, WatchEntry};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row, Sqlite};

/// Result of enrolling an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollOutcome {
    /// A new entry was created
    Added,
    /// An inactive entry was switched back on
    Reactivated,
    /// The item is already actively watched
    AlreadyExists,
}

/// Enroll `item_id` in the watch-list, due immediately.
///
/// An inactive entry is reactivated with the new cadence and note. An active
/// entry is left untouched.
///
/// # Errors
/// Returns an error if the database operation fails.
pub async fn enroll(
    pool: &Pool<Sqlite>,
    item_id: &ItemId,
    cadence: Cadence,
    note: Option<&str>,
) -> Result<EnrollOutcome> {
    let now = format_timestamp(Utc::now());

    // Each statement is atomic, so concurrent enrolls of one item never race
    // on the primary key.
    let inserted = sqlx::query(
        "INSERT INTO watch_entries
         (item_id, active, cadence, last_run_at, next_due_at, note, created_at, updated_at)
         VALUES (?, 1, ?, NULL, ?, ?, ?, ?)
         ON CONFLICT(item_id) DO NOTHING",
    )
    .bind(item_id.as_str())
    .bind(cadence.as_str())
    .bind(&now)
    .bind(note)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;
    if inserted.rows_affected() > 0 {
        tracing::info!("Added {} to watch-list ({})", item_id, cadence);
        return Ok(EnrollOutcome::Added);
    }

    let reactivated = sqlx::query(
        "UPDATE watch_entries
         SET active = 1, cadence = ?, note = ?, next_due_at = ?, updated_at = ?
         WHERE item_id = ? AND active = 0",
    )
    .bind(cadence.as_str())
    .bind(note)
    .bind(&now)
    .bind(&now)
    .bind(item_id.as_str())
    .execute(pool)
    .await?;
    if reactivated.rows_affected() > 0 {
        tracing::info!("Reactivated {} in watch-list ({})", item_id, cadence);
        return Ok(EnrollOutcome::Reactivated);
    }

    tracing::warn!("Item {} already in watch-list", item_id);
    Ok(EnrollOutcome::AlreadyExists)
}

/// Set the `active` flag. Returns `false` if the item is not enrolled.
///
/// Used for removal (soft delete), pause and resume.
///
/// # Errors
/// Returns an error if the database operation fails.
pub async fn set_active(pool: &Pool<Sqlite>, item_id: &ItemId, active: bool) -> Result<bool> {
    let result =
        sqlx::query("UPDATE watch_entries SET active = ?, updated_at = ? WHERE item_id = ?")
            .bind(active)
            .bind(format_timestamp(Utc::now()))
            .bind(item_id.as_str())
            .execute(pool)
            .await?;

    let found = result.rows_affected() > 0;
    if !found {
        tracing::warn!("Item {} not found in watch-list", item_id);
    }
    Ok(found)
}

/// Record a completed crawl. Returns `false` if the item is not enrolled.
///
/// # Errors
/// Returns an error if the database operation fails.
pub async fn record_run(
    pool: &Pool<Sqlite>,
    item_id: &ItemId,
    update: WatchRunUpdate,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE watch_entries SET last_run_at = ?, next_due_at = ?, updated_at = ? WHERE item_id = ?",
    )
    .bind(format_timestamp(update.last_run()))
    .bind(format_timestamp(update.next_due()))
    .bind(format_timestamp(Utc::now()))
    .bind(item_id.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Look up one entry.
///
/// # Errors
/// Returns an error if the query fails or the row cannot be decoded.
pub async fn get_entry(pool: &Pool<Sqlite>, item_id: &ItemId) -> Result<Option<WatchEntry>> {
    let row = sqlx::query(
        "SELECT item_id, active, cadence, last_run_at, next_due_at, note, created_at
         FROM watch_entries WHERE item_id = ?",
    )
    .bind(item_id.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(row_to_entry).transpose()
}

/// All entries, active or not, ordered by enrollment time.
///
/// # Errors
/// Returns an error if the query fails or a row cannot be decoded.
pub async fn list_entries(pool: &Pool<Sqlite>) -> Result<Vec<WatchEntry>> {
    let rows = sqlx::query(
        "SELECT item_id, active, cadence, last_run_at, next_due_at, note, created_at
         FROM watch_entries ORDER BY created_at, item_id",
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_entry).collect()
}

/// Active entries whose next-due time is unset or not after `now`.
///
/// # Errors
/// Returns an error if the query fails or a row cannot be decoded.
pub async fn list_due(pool: &Pool<Sqlite>, now: DateTime<Utc>) -> Result<Vec<WatchEntry>> {
    let rows = sqlx::query(
        "SELECT item_id, active, cadence, last_run_at, next_due_at, note, created_at
         FROM watch_entries
         WHERE active = 1 AND (next_due_at IS NULL OR next_due_at <= ?)
         ORDER BY next_due_at, item_id",
    )
    .bind(format_timestamp(now))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_entry).collect()
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<WatchEntry> {
    let item_id: String = row.try_get("item_id")?;
    let item_id = ItemId::new(item_id)
        .map_err(|e| DatabaseError::Decode(format!("watch_entries.item_id: {e}")))?;

    let cadence: String = row.try_get("cadence")?;
    let last_run_at: Option<String> = row.try_get("last_run_at")?;
    let next_due_at: Option<String> = row.try_get("next_due_at")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(WatchEntry {
        item_id,
        active: row.try_get("active")?,
        cadence: Cadence::parse_lenient(&cadence),
        last_run_at: last_run_at.as_deref().map(parse_timestamp).transpose()?,
        next_due_at: next_due_at.as_deref().map(parse_timestamp).transpose()?,
        note: row.try_get("note")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::Duration;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn item(id: &str) -> ItemId {
        ItemId::new(id).expect("valid item ID")
    }

    #[tokio::test]
    async fn test_enroll_outcomes() {
        let db = setup_test_db().await;
        let id = item("B019QZBS10");

        let first = enroll(db.pool(), &id, Cadence::Daily, None)
            .await
            .expect("enroll");
        assert_eq!(first, EnrollOutcome::Added);

        let second = enroll(db.pool(), &id, Cadence::Weekly, None)
            .await
            .expect("enroll");
        assert_eq!(second, EnrollOutcome::AlreadyExists);
        let entry = get_entry(db.pool(), &id).await.expect("get").expect("exists");
        assert_eq!(entry.cadence, Cadence::Daily);

        assert!(set_active(db.pool(), &id, false).await.expect("deactivate"));
        let third = enroll(db.pool(), &id, Cadence::Weekly, Some("gift"))
            .await
            .expect("enroll");
        assert_eq!(third, EnrollOutcome::Reactivated);

        let entry = get_entry(db.pool(), &id).await.expect("get").expect("exists");
        assert!(entry.active);
        assert_eq!(entry.cadence, Cadence::Weekly);
        assert_eq!(entry.note.as_deref(), Some("gift"));
    }

    #[tokio::test]
    async fn test_removal_is_soft() {
        let db = setup_test_db().await;
        let id = item("B019QZBS10");
        enroll(db.pool(), &id, Cadence::Daily, None)
            .await
            .expect("enroll");

        assert!(set_active(db.pool(), &id, false).await.expect("remove"));
        let entry = get_entry(db.pool(), &id).await.expect("get");
        assert!(entry.is_some_and(|e| !e.active));

        assert!(!set_active(db.pool(), &item("B000000000"), false)
            .await
            .expect("remove unknown"));
    }

    #[tokio::test]
    async fn test_due_selection() {
        let db = setup_test_db().await;
        let due_now = item("B000000001");
        let later = item("B000000002");
        let paused = item("B000000003");

        for id in [&due_now, &later, &paused] {
            enroll(db.pool(), id, Cadence::Daily, None)
                .await
                .expect("enroll");
        }

        let now = Utc::now() + Duration::seconds(1);
        let update = WatchRunUpdate::new(now, Cadence::Weekly.next_due(now)).expect("update");
        assert!(record_run(db.pool(), &later, update).await.expect("record"));
        set_active(db.pool(), &paused, false).await.expect("pause");

        let due: Vec<_> = list_due(db.pool(), now)
            .await
            .expect("list due")
            .into_iter()
            .map(|e| e.item_id)
            .collect();
        assert_eq!(due, vec![due_now.clone()]);

        let all = list_entries(db.pool()).await.expect("list");
        assert_eq!(all.len(), 3);

        let later_entry = get_entry(db.pool(), &later).await.expect("get").expect("exists");
        assert_eq!(later_entry.last_run_at, Some(update.last_run()));
        assert_eq!(later_entry.next_due_at, Some(update.next_due()));
    }

    #[tokio::test]
    async fn test_record_run_unknown_item() {
        let db = setup_test_db().await;
        let now = Utc::now();
        let update = WatchRunUpdate::new(now, now + Duration::days(1)).expect("update");
        assert!(!record_run(db.pool(), &item("B019QZBS10"), update)
            .await
            .expect("record"));
    }
}
