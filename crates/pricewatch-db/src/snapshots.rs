//! Snapshot history storage.
//!
//! Snapshots are append-only. Product fields are stored as a JSON document so
//! the schema can grow without migrations.

use crate::error::{DatabaseError, Result};
use crate::{format_timestamp, parse_timestamp};
use pricewatch_core::{ItemId, ProductFields, Snapshot, TimeWindow};
use sqlx::{Pool, Row, Sqlite};

/// Insert one snapshot.
///
/// # Errors
/// Returns an error if the fields cannot be encoded or the insert fails
/// (including a duplicate snapshot ID).
pub async fn insert_snapshot(pool: &Pool<Sqlite>, snapshot: &Snapshot) -> Result<()> {
    let fields = serde_json::to_string(&snapshot.fields)?;

    sqlx::query(
        "INSERT INTO snapshots (id, item_id, captured_at, success, error, fields)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&snapshot.id)
    .bind(snapshot.item_id.as_str())
    .bind(format_timestamp(snapshot.captured_at))
    .bind(snapshot.success)
    .bind(&snapshot.error)
    .bind(fields)
    .execute(pool)
    .await?;

    tracing::debug!(
        "Stored {} snapshot {} for {}",
        if snapshot.success { "successful" } else { "failed" },
        snapshot.id,
        snapshot.item_id
    );
    Ok(())
}

/// Successful snapshots for `item_id` inside `window`, newest first.
///
/// `limit` caps the number of rows returned.
///
/// # Errors
/// Returns an error if the query fails or a row cannot be decoded.
pub async fn successful_in_window(
    pool: &Pool<Sqlite>,
    item_id: &ItemId,
    window: &TimeWindow,
    limit: Option<u32>,
) -> Result<Vec<Snapshot>> {
    let start = window.start.map(format_timestamp);
    let end = window.end.map(format_timestamp);

    let rows = sqlx::query(
        "SELECT id, item_id, captured_at, success, error, fields
         FROM snapshots
         WHERE item_id = ?
           AND success = 1
           AND (? IS NULL OR captured_at >= ?)
           AND (? IS NULL OR captured_at < ?)
         ORDER BY captured_at DESC, rowid DESC
         LIMIT ?",
    )
    .bind(item_id.as_str())
    .bind(&start)
    .bind(&start)
    .bind(&end)
    .bind(&end)
    .bind(limit.map_or(-1, i64::from))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_snapshot).collect()
}

/// Every snapshot for `item_id`, successful or not, newest first.
///
/// # Errors
/// Returns an error if the query fails or a row cannot be decoded.
pub async fn list_for_item(
    pool: &Pool<Sqlite>,
    item_id: &ItemId,
    limit: u32,
) -> Result<Vec<Snapshot>> {
    let rows = sqlx::query(
        "SELECT id, item_id, captured_at, success, error, fields
         FROM snapshots
         WHERE item_id = ?
         ORDER BY captured_at DESC, rowid DESC
         LIMIT ?",
    )
    .bind(item_id.as_str())
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_snapshot).collect()
}

/// Number of snapshots stored for `item_id`.
///
/// # Errors
/// Returns an error if the query fails.
pub async fn count_for_item(pool: &Pool<Sqlite>, item_id: &ItemId) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM snapshots WHERE item_id = ?")
        .bind(item_id.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

fn row_to_snapshot(row: &sqlx::sqlite::SqliteRow) -> Result<Snapshot> {
    let item_id: String = row.try_get("item_id")?;
    let item_id = ItemId::new(item_id)
        .map_err(|e| DatabaseError::Decode(format!("snapshots.item_id: {e}")))?;

    let captured_at: String = row.try_get("captured_at")?;
    let fields: String = row.try_get("fields")?;
    let fields: ProductFields = serde_json::from_str(&fields)?;

    Ok(Snapshot {
        id: row.try_get("id")?,
        item_id,
        captured_at: parse_timestamp(&captured_at)?,
        success: row.try_get("success")?,
        error: row.try_get("error")?,
        fields,
    })
}
