//! Chunked, paced execution of a work list.

use crate::error::{CrawlError, Result};
use crate::stats::BatchStats;
use crate::task::{CrawlOutcome, WorkItem};
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Run `items` in consecutive chunks of `batch_size`.
///
/// Every item in a chunk runs concurrently and the next chunk starts only
/// after all of them finish. Between chunks (never after the last) the run
/// sleeps for `pacing`. Within a chunk the item at position `i` is handed
/// profile `i % capacity`. A task that panics is recorded as a failed
/// outcome. Cancellation is honored at chunk boundaries and during pacing;
/// the stats returned then cover the chunks that ran.
///
/// # Errors
/// Returns [`CrawlError::InvalidBatchSize`] if `batch_size` is 0. Per-item
/// failures are recorded in the stats, never returned.
pub async fn run_chunked<F, Fut>(
    items: &[WorkItem],
    batch_size: usize,
    pacing: Duration,
    capacity: usize,
    cancel: &CancellationToken,
    task: F,
) -> Result<BatchStats>
where
    F: Fn(WorkItem, usize) -> Fut,
    Fut: Future<Output = CrawlOutcome>,
{
    if batch_size == 0 {
        return Err(CrawlError::InvalidBatchSize);
    }

    let capacity = capacity.max(1);
    let started = Instant::now();
    let batch_count = items.len().div_ceil(batch_size);
    let mut stats = BatchStats::new(items.len());

    for (index, chunk) in items.chunks(batch_size).enumerate() {
        if cancel.is_cancelled() {
            tracing::warn!(
                "Crawl run cancelled before batch {}/{}",
                index + 1,
                batch_count
            );
            stats.cancelled = true;
            break;
        }

        tracing::info!(
            "Starting batch {}/{} ({} items)",
            index + 1,
            batch_count,
            chunk.len()
        );

        let outcomes = join_all(chunk.iter().enumerate().map(|(slot, item)| {
            let profile_id = slot % capacity;
            let item_id = item.item_id.clone();
            AssertUnwindSafe(task(item.clone(), profile_id))
                .catch_unwind()
                .map(move |result| {
                    result.unwrap_or_else(|panic| {
                        let message = panic_message(&*panic);
                        tracing::error!("Crawl task for {} panicked: {}", item_id, message);
                        CrawlOutcome::panicked(item_id, profile_id, &message)
                    })
                })
        }))
        .await;

        let succeeded = outcomes.iter().filter(|o| o.success).count();
        tracing::info!(
            "Batch {}/{} done: {}/{} succeeded",
            index + 1,
            batch_count,
            succeeded,
            outcomes.len()
        );

        stats.batches_processed += 1;
        for outcome in outcomes {
            stats.record(outcome);
        }

        if index + 1 < batch_count && !pacing.is_zero() {
            tracing::debug!("Pacing {:?} before next batch", pacing);
            tokio::select! {
                () = tokio::time::sleep(pacing) => {}
                () = cancel.cancelled() => {}
            }
        }
    }

    stats.elapsed = started.elapsed();
    Ok(stats)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
