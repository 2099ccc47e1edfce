//! Job scheduling: when watched items and the daily crawl are due.

use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Returns true if `next_due` is unset or not after `now`.
#[must_use]
pub fn is_due(next_due: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    next_due.map_or(true, |due| due <= now)
}

/// The next instant strictly after `now` whose UTC wall-clock time is
/// `hour:minute`.
#[must_use]
pub fn next_daily_run(now: DateTime<Utc>, hour: u32, minute: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Sleep until the next daily run and return the instant that was reached.
pub async fn sleep_until_daily(hour: u32, minute: u32) -> DateTime<Utc> {
    let target = next_daily_run(Utc::now(), hour, minute);
    let wait = (target - Utc::now()).to_std().unwrap_or_default();
    tracing::info!(
        "Next daily crawl at {} (in {}s)",
        target.to_rfc3339(),
        wait.as_secs()
    );
    tokio::time::sleep(wait).await;
    target
}
