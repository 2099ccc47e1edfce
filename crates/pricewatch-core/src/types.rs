//! Shared types used across Pricewatch.

use crate::error::CoreError;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Newtype for tracked item identifiers.
///
/// Item IDs are exactly 10 ASCII alphanumeric characters. Input is
/// upper-cased before validation so `b019qzbs10` and `B019QZBS10` name the
/// same item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    /// Length of every item identifier.
    pub const LEN: usize = 10;

    /// Create a new `ItemId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not 10 alphanumeric characters.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into().trim().to_ascii_uppercase();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), CoreError> {
        static ITEM_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = ITEM_REGEX.get_or_init(|| Regex::new(r"^[A-Z0-9]{10}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "invalid item ID: must be {} alphanumeric characters, got '{id}'",
                Self::LEN
            )))
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ItemId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl std::str::FromStr for ItemId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A half-open time range `[start, end)` used to select stored snapshots.
///
/// A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    /// Inclusive lower bound
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// The window covering all time.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Everything at or after `start`.
    #[must_use]
    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Everything in `[start, end)`.
    #[must_use]
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// The UTC calendar day before the day containing `now`.
    #[must_use]
    pub fn previous_day(now: DateTime<Utc>) -> Self {
        let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        Self::between(today - Duration::days(1), today)
    }

    /// The `hours` preceding `now`, excluding `now` itself.
    #[must_use]
    pub fn lookback(now: DateTime<Utc>, hours: u32) -> Self {
        Self::between(now - Duration::hours(i64::from(hours)), now)
    }

    /// The last `days` days up to and including `now`.
    #[must_use]
    pub fn last_days(now: DateTime<Utc>, days: u32) -> Self {
        Self::since(now - Duration::days(i64::from(days)))
    }

    /// Whether `ts` falls inside the window.
    #[must_use]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts < e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_item_id_valid() {
        let id = ItemId::new("B019QZBS10").expect("valid item ID");
        assert_eq!(id.as_str(), "B019QZBS10");
        assert_eq!(id.to_string(), "B019QZBS10");
    }

    #[test]
    fn test_item_id_normalizes_case_and_whitespace() {
        let id = ItemId::new("  b07xjwd6bf ").expect("valid item ID");
        assert_eq!(id.as_str(), "B07XJWD6BF");
    }

    #[test]
    fn test_item_id_invalid() {
        assert!(ItemId::new("").is_err());
        assert!(ItemId::new("B019QZBS1").is_err()); // 9 chars
        assert!(ItemId::new("B019QZBS100").is_err()); // 11 chars
        assert!(ItemId::new("B019-ZBS10").is_err());
    }

    #[test]
    fn test_item_id_serde_validates() {
        let id: ItemId = serde_json::from_str("\"b019qzbs10\"").expect("deserialize");
        assert_eq!(id.as_str(), "B019QZBS10");
        assert!(serde_json::from_str::<ItemId>("\"nope\"").is_err());
    }

    #[test]
    fn test_previous_day_window() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 8, 30, 0).unwrap();
        let window = TimeWindow::previous_day(now);

        assert!(window.contains(Utc.with_ymd_and_hms(2026, 3, 9, 0, 0, 0).unwrap()));
        assert!(window.contains(Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 59).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap()));
        assert!(!window.contains(Utc.with_ymd_and_hms(2026, 3, 8, 23, 59, 59).unwrap()));
    }

    #[test]
    fn test_lookback_excludes_now() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 8, 30, 0).unwrap();
        let window = TimeWindow::lookback(now, 24);
        assert!(!window.contains(now));
        assert!(window.contains(now - Duration::hours(24)));
        assert!(!window.contains(now - Duration::hours(25)));
    }

    #[test]
    fn test_unbounded_window() {
        let window = TimeWindow::all();
        assert!(window.contains(Utc.with_ymd_and_hms(1999, 1, 1, 0, 0, 0).unwrap()));
        assert!(window.contains(Utc::now()));
    }
}
