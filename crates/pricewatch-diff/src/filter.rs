//! Significance policies applied after field comparison.

use crate::changeset::FieldChange;
use crate::normalize::FieldValue;
use std::collections::{BTreeSet, HashMap};

/// Decides which detected differences are worth reporting.
pub trait SignificanceFilter: Send + Sync {
    /// Whether `change` should be kept in the change-set.
    fn is_significant(&self, change: &FieldChange) -> bool;
}

/// Reports every detected difference.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAll;

impl SignificanceFilter for ReportAll {
    fn is_significant(&self, _change: &FieldChange) -> bool {
        true
    }
}

/// Drops small moves on noisy fields.
///
/// Prices must move by at least `min_price_percent`, counts by at least the
/// configured absolute amount, and titles must differ by more than
/// `max_title_similarity` word overlap. Everything else is reported.
#[derive(Debug, Clone)]
pub struct MagnitudeFilter {
    min_price_percent: f64,
    min_count_delta: HashMap<String, f64>,
    max_title_similarity: f64,
}

impl Default for MagnitudeFilter {
    fn default() -> Self {
        let mut min_count_delta = HashMap::new();
        min_count_delta.insert("rating".to_string(), 0.1);
        min_count_delta.insert("rating_count".to_string(), 10.0);
        Self {
            min_price_percent: 1.0,
            min_count_delta,
            max_title_similarity: 0.8,
        }
    }
}

impl MagnitudeFilter {
    /// Require price moves of at least `percent`.
    #[must_use]
    pub fn min_price_percent(mut self, percent: f64) -> Self {
        self.min_price_percent = percent;
        self
    }

    /// Require `field` to move by at least `delta`.
    #[must_use]
    pub fn min_delta(mut self, field: &str, delta: f64) -> Self {
        self.min_count_delta.insert(field.to_string(), delta);
        self
    }

    fn title_similarity(old: &str, new: &str) -> f64 {
        let old: BTreeSet<String> = old.split_whitespace().map(str::to_lowercase).collect();
        let new: BTreeSet<String> = new.split_whitespace().map(str::to_lowercase).collect();
        let total = old.union(&new).count();
        if total == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let similarity = old.intersection(&new).count() as f64 / total as f64;
        similarity
    }
}

impl SignificanceFilter for MagnitudeFilter {
    fn is_significant(&self, change: &FieldChange) -> bool {
        match change.field.as_str() {
            "sale_price" | "list_price" => change
                .percent_change()
                .map_or(true, |pct| pct.abs() >= self.min_price_percent),
            "title" => match (&change.old, &change.new) {
                (FieldValue::Text(old), FieldValue::Text(new)) => {
                    Self::title_similarity(old, new) < self.max_title_similarity
                }
                _ => true,
            },
            field => match (self.min_count_delta.get(field), change.delta()) {
                (Some(min), Some(delta)) => delta.abs() + 1e-9 >= *min,
                _ => true,
            },
        }
    }
}
