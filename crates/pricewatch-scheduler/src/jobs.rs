//! Watch entry and cadence definitions.

use chrono::{DateTime, Duration, Utc};
use pricewatch_core::ItemId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How often a watched item is crawled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    /// Every day
    #[default]
    Daily,
    /// Every 7 days
    Weekly,
    /// Every 30 days
    Monthly,
}

impl Cadence {
    /// Length of one cadence period in days.
    #[must_use]
    pub fn interval_days(self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
        }
    }

    /// Next due time after a run at `last_run`. Always strictly later.
    #[must_use]
    pub fn next_due(self, last_run: DateTime<Utc>) -> DateTime<Utc> {
        last_run + Duration::days(self.interval_days())
    }

    /// Lower-case name as stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Parse a stored cadence, treating anything unrecognized as daily.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown cadence '{}', defaulting to daily", value);
            Self::Daily
        })
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(format!("unknown cadence: {other}")),
        }
    }
}

/// One watched item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    /// Item being watched
    pub item_id: ItemId,
    /// Soft-delete flag; inactive entries are never due
    pub active: bool,
    /// Crawl cadence
    pub cadence: Cadence,
    /// When the item was last crawled successfully
    pub last_run_at: Option<DateTime<Utc>>,
    /// When the item is next due; `None` means immediately
    pub next_due_at: Option<DateTime<Utc>>,
    /// Free-form note
    pub note: Option<String>,
    /// When the item was enrolled
    pub created_at: DateTime<Utc>,
}

impl WatchEntry {
    /// Whether the entry should be crawled at `now`.
    #[must_use]
    pub fn is_due_at(&self, now: DateTime<Utc>) -> bool {
        self.active && crate::scheduler::is_due(self.next_due_at, now)
    }
}
