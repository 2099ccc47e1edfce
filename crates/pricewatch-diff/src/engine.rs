//! The snapshot diff engine.

use crate::changeset::{ChangeResult, ChangeSet, FieldChange, HistoryEntry};
use crate::error::Result;
use crate::filter::{ReportAll, SignificanceFilter};
use crate::registry::FieldRegistry;
use chrono::{DateTime, Utc};
use pricewatch_core::{DiffConfig, ItemId, PriorWindow, Snapshot, SnapshotStore, TimeWindow};
use std::sync::Arc;

/// Compares stored snapshots field by field.
///
/// Results depend only on the stored snapshots and the comparison time, so
/// repeated calls return the same answer.
pub struct DiffEngine {
    store: Arc<dyn SnapshotStore>,
    registry: FieldRegistry,
    filter: Box<dyn SignificanceFilter>,
    prior_window: PriorWindow,
    lookback_hours: u32,
}

impl DiffEngine {
    /// An engine with default thresholds, comparing against the previous
    /// UTC day and reporting every difference.
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            registry: FieldRegistry::default(),
            filter: Box::new(ReportAll),
            prior_window: PriorWindow::PreviousDay,
            lookback_hours: 24,
        }
    }

    /// An engine configured from the `[diff]` config section.
    ///
    /// # Errors
    /// Returns an error if a threshold override is invalid.
    pub fn from_config(store: Arc<dyn SnapshotStore>, config: &DiffConfig) -> Result<Self> {
        Ok(Self {
            registry: FieldRegistry::with_thresholds(&config.thresholds)?,
            prior_window: config.prior_window,
            lookback_hours: config.lookback_hours,
            ..Self::new(store)
        })
    }

    /// Replace the significance policy.
    #[must_use]
    pub fn with_filter(mut self, filter: impl SignificanceFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    /// Replace the field registry.
    #[must_use]
    pub fn with_registry(mut self, registry: FieldRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The field registry in use.
    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Window the prior snapshot is drawn from, relative to `now`.
    pub fn prior_window(&self, now: DateTime<Utc>) -> TimeWindow {
        match self.prior_window {
            PriorWindow::PreviousDay => TimeWindow::previous_day(now),
            PriorWindow::Lookback => TimeWindow::lookback(now, self.lookback_hours),
        }
    }

    /// Compare the item's latest snapshot against its prior-window snapshot.
    pub async fn diff(&self, item_id: &ItemId) -> Result<ChangeResult> {
        self.diff_at(item_id, Utc::now()).await
    }

    /// [`diff`](Self::diff) evaluated as of `now`.
    pub async fn diff_at(&self, item_id: &ItemId, now: DateTime<Utc>) -> Result<ChangeResult> {
        let prior_window = self.prior_window(now);
        let Some(previous) = self
            .store
            .load_snapshot_in_window(item_id, &prior_window)
            .await?
        else {
            tracing::info!("No prior snapshot for {}, first observation", item_id);
            return Ok(ChangeResult::FirstObservation);
        };

        let Some(current) = self
            .store
            .load_snapshot_in_window(item_id, &TimeWindow::all())
            .await?
        else {
            return Ok(ChangeResult::FirstObservation);
        };

        let changes = self.compare(&previous, &current);
        if changes.is_empty() {
            tracing::debug!("No changes for {}", item_id);
            Ok(ChangeResult::NoChange)
        } else {
            tracing::info!(
                "Detected {} changes for {}: {}",
                changes.len(),
                item_id,
                changes.fields().collect::<Vec<_>>().join(", ")
            );
            Ok(ChangeResult::Changed(changes))
        }
    }

    /// Field-by-field comparison of two snapshots, after significance
    /// filtering.
    pub fn compare(&self, previous: &Snapshot, current: &Snapshot) -> ChangeSet {
        let mut set = ChangeSet::between(previous, current);

        for spec in self.registry.iter() {
            let old = spec.value(&previous.fields);
            let new = spec.value(&current.fields);
            if !spec.differs(&old, &new) {
                continue;
            }

            let change = FieldChange {
                field: spec.name.to_string(),
                kind: spec.kind,
                old,
                new,
            };
            if self.filter.is_significant(&change) {
                set.changes.insert(change.field.clone(), change);
            }
        }

        set
    }

    /// Changes between each consecutive pair of successful snapshots in
    /// `window`, newest first. Pairs without changes are omitted.
    pub async fn get_history(
        &self,
        item_id: &ItemId,
        window: &TimeWindow,
    ) -> Result<Vec<HistoryEntry>> {
        let snapshots = self.store.load_snapshots_in_window(item_id, window).await?;

        let history = snapshots
            .windows(2)
            .filter_map(|pair| {
                let (current, previous) = (&pair[0], &pair[1]);
                let changes = self.compare(previous, current);
                (!changes.is_empty()).then(|| HistoryEntry {
                    captured_at: current.captured_at,
                    changes,
                })
            })
            .collect();

        Ok(history)
    }
}
