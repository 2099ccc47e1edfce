//! Batch run statistics.

use crate::task::CrawlOutcome;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;

/// Aggregate result of one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    /// Items in the work list
    pub total: usize,
    /// Items crawled and persisted successfully
    pub successful: usize,
    /// Items whose crawl failed
    pub failed: usize,
    /// Items with at least one reportable change
    pub changed: usize,
    /// Batches that ran to completion
    pub batches_processed: usize,
    /// Distinct profile IDs used
    pub profiles_used: usize,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
    /// Whether the run stopped early on cancellation
    pub cancelled: bool,
    /// Per-item outcomes in work-list order
    pub results: Vec<CrawlOutcome>,
    #[serde(skip)]
    profile_ids: BTreeSet<usize>,
}

impl BatchStats {
    /// Empty stats for a work list of `total` items.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Fold one outcome into the totals.
    pub fn record(&mut self, outcome: CrawlOutcome) {
        if outcome.success {
            self.successful += 1;
        } else {
            self.failed += 1;
        }
        if outcome.changes > 0 {
            self.changed += 1;
        }
        self.profile_ids.insert(outcome.profile_id);
        self.profiles_used = self.profile_ids.len();
        self.results.push(outcome);
    }

    /// Items that were attempted.
    pub fn processed(&self) -> usize {
        self.successful + self.failed
    }

    /// Failed outcomes.
    pub fn failures(&self) -> impl Iterator<Item = &CrawlOutcome> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Log the end-of-run summary, one line per failed item.
    pub fn log_summary(&self) {
        tracing::info!(
            "Crawl run finished in {:.1}s: {}/{} processed, {} succeeded, {} failed, {} changed, {} batches, {} profiles",
            self.elapsed.as_secs_f64(),
            self.processed(),
            self.total,
            self.successful,
            self.failed,
            self.changed,
            self.batches_processed,
            self.profiles_used
        );
        if self.cancelled {
            tracing::warn!(
                "Run cancelled; {} items not attempted",
                self.total.saturating_sub(self.processed())
            );
        }
        for failure in self.failures() {
            tracing::warn!(
                "  {} (profile {}): {}",
                failure.item_id,
                failure.profile_id,
                failure.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}
