//! Diff results.

use crate::normalize::FieldValue;
use crate::registry::FieldKind;
use chrono::{DateTime, Utc};
use pricewatch_core::{ItemId, Snapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Field name
    pub field: String,
    /// Field kind, for formatting
    pub kind: FieldKind,
    /// Normalized previous value
    pub old: FieldValue,
    /// Normalized current value
    pub new: FieldValue,
}

impl FieldChange {
    /// Signed percentage change for numeric fields with a non-zero old value.
    pub fn percent_change(&self) -> Option<f64> {
        let old = self.old.as_number()?;
        let new = self.new.as_number()?;
        if old == 0.0 {
            return None;
        }
        Some((new - old) / old.abs() * 100.0)
    }

    /// Signed absolute change for numeric fields.
    pub fn delta(&self) -> Option<f64> {
        Some(self.new.as_number()? - self.old.as_number()?)
    }
}

/// The reportable differences between two snapshots of one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Item compared
    pub item_id: ItemId,
    /// Capture time of the older snapshot
    pub previous_at: DateTime<Utc>,
    /// Capture time of the newer snapshot
    pub current_at: DateTime<Utc>,
    /// Changed fields keyed by name
    pub changes: BTreeMap<String, FieldChange>,
}

impl ChangeSet {
    /// An empty change-set between two snapshots.
    pub fn between(previous: &Snapshot, current: &Snapshot) -> Self {
        Self {
            item_id: current.item_id.clone(),
            previous_at: previous.captured_at,
            current_at: current.captured_at,
            changes: BTreeMap::new(),
        }
    }

    /// Whether no field changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changed fields.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Look up one field's change.
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    /// Changed field names in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }
}

/// Outcome of comparing an item against its prior observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ChangeResult {
    /// No successful snapshot exists in the prior window
    FirstObservation,
    /// Prior and current snapshots match
    NoChange,
    /// At least one reportable field changed
    Changed(ChangeSet),
}

impl ChangeResult {
    /// The change-set, if anything changed.
    pub fn changes(&self) -> Option<&ChangeSet> {
        match self {
            Self::Changed(set) => Some(set),
            _ => None,
        }
    }
}

/// One step of an item's change history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Capture time of the newer snapshot in the pair
    pub captured_at: DateTime<Utc>,
    /// What changed since the previous successful snapshot
    pub changes: ChangeSet,
}
