//! Subcommand implementations.

use crate::state::AppState;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use pricewatch_core::{ItemId, ScheduleConfig, SnapshotStore, TimeWindow};
use pricewatch_crawler::{BatchStats, CrawlOrchestrator, WorkItem};
use pricewatch_db::EnrollOutcome;
use pricewatch_diff::ChangeResult;
use pricewatch_notify::render_change_message;
use pricewatch_scheduler::{sleep_until_daily, Cadence};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn parse_item(raw: &str) -> Result<ItemId> {
    ItemId::new(raw).with_context(|| format!("'{raw}' is not a valid item ID"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Work item for `item_id`, using its watch cadence when it is enrolled.
async fn work_item(state: &AppState, item_id: ItemId) -> Result<WorkItem> {
    let cadence = state
        .db
        .watch_entry(&item_id)
        .await?
        .map_or(Cadence::Daily, |entry| entry.cadence);
    Ok(WorkItem::new(item_id).with_cadence(cadence))
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current batch");
            token.cancel();
        }
    });
}

fn interruptible(state: &AppState) -> Result<CrawlOrchestrator<pricewatch_browser::ChromiumExtractor>> {
    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());
    Ok(state.orchestrator()?.with_cancellation(token))
}

/// Crawl every due item at the configured time each day until interrupted.
pub async fn run(state: &AppState, immediately: bool) -> Result<()> {
    let (hour, minute) = ScheduleConfig::parse_time(&state.config.schedule.daily_crawl_time)?;
    let orchestrator = interruptible(state)?;
    let token = orchestrator.cancellation_token().clone();

    tracing::info!(
        "Daily crawl scheduled at {:02}:{:02} UTC; press Ctrl-C to stop",
        hour,
        minute
    );

    if immediately {
        scheduled_pass(state, &orchestrator).await;
    }

    loop {
        tokio::select! {
            _ = sleep_until_daily(hour, minute) => {
                scheduled_pass(state, &orchestrator).await;
            }
            () = token.cancelled() => break,
        }
    }

    tracing::info!("Daily loop stopped");
    Ok(())
}

/// One pass of the daily loop. A failed pass is logged and the loop waits
/// for the next trigger.
async fn scheduled_pass(
    state: &AppState,
    orchestrator: &CrawlOrchestrator<pricewatch_browser::ChromiumExtractor>,
) -> Option<BatchStats> {
    match run_due_once(state, orchestrator).await {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::error!("Scheduled crawl failed, retrying at the next trigger: {:#}", e);
            None
        }
    }
}

async fn run_due_once(
    state: &AppState,
    orchestrator: &CrawlOrchestrator<pricewatch_browser::ChromiumExtractor>,
) -> Result<BatchStats> {
    let now = Utc::now();
    let entries = state.db.due_entries(now).await?;
    Ok(orchestrator.run_due(&entries, now).await?)
}

/// Crawl due items once and exit.
pub async fn due(state: &AppState) -> Result<()> {
    let orchestrator = interruptible(state)?;
    let stats = run_due_once(state, &orchestrator).await?;
    print_json(&stats)
}

/// Crawl one item now.
pub async fn crawl(state: &AppState, item: &str) -> Result<()> {
    let item = work_item(state, parse_item(item)?).await?;
    let orchestrator = state.orchestrator()?;

    let outcome = orchestrator.crawl_one(item).await;
    orchestrator.shutdown().await;

    print_json(&outcome)?;
    if !outcome.success {
        bail!(
            "crawl of {} failed: {}",
            outcome.item_id,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

/// Crawl an explicit list of items.
pub async fn batch(
    state: &AppState,
    items: &[String],
    batch_size: Option<usize>,
    pacing_secs: Option<u64>,
) -> Result<()> {
    let mut work = Vec::with_capacity(items.len());
    for raw in items {
        work.push(work_item(state, parse_item(raw)?).await?);
    }

    let batch_size = batch_size.unwrap_or(state.config.batch.batch_size);
    let pacing = pacing_secs.map_or_else(|| state.config.batch.pacing_delay(), Duration::from_secs);

    let orchestrator = interruptible(state)?;
    let stats = orchestrator.run_batch(work, batch_size, pacing).await?;
    print_json(&stats)
}

/// Compare the latest snapshot of an item with the prior window.
pub async fn diff(state: &AppState, item: &str) -> Result<()> {
    let item_id = parse_item(item)?;
    let result = state.diff_engine()?.diff(&item_id).await?;

    match &result {
        ChangeResult::Changed(changes) => {
            let latest = state
                .db
                .load_snapshot_in_window(&item_id, &TimeWindow::all())
                .await?
                .context("changed item has no successful snapshot")?;
            let link = pricewatch_browser::item_url(&state.config.browser.url_template, &item_id);
            let message = render_change_message(changes, &latest, Some(&link));
            println!("{}\n\n{}", message.subject, message.body);
        }
        ChangeResult::NoChange => println!("{item_id}: no changes"),
        ChangeResult::FirstObservation => {
            println!("{item_id}: no snapshot in the prior window to compare against");
        }
    }
    Ok(())
}

/// Print the change history of an item over the last `days` days.
pub async fn history(state: &AppState, item: &str, days: u32) -> Result<()> {
    let item_id = parse_item(item)?;
    let window = TimeWindow::last_days(Utc::now(), days);
    let history = state.diff_engine()?.get_history(&item_id, &window).await?;

    if history.is_empty() {
        println!("{item_id}: no changes in the last {days} days");
        return Ok(());
    }
    print_json(&history)
}

/// Enroll an item in the watch-list.
pub async fn watch_add(
    state: &AppState,
    item: &str,
    cadence: &str,
    note: Option<&str>,
) -> Result<()> {
    let item_id = parse_item(item)?;
    let cadence = Cadence::parse_lenient(cadence);
    let message = match state.db.enroll(&item_id, cadence, note).await? {
        EnrollOutcome::Added => format!("{item_id}: added ({cadence})"),
        EnrollOutcome::Reactivated => format!("{item_id}: reactivated ({cadence})"),
        EnrollOutcome::AlreadyExists => format!("{item_id}: already watched"),
    };
    println!("{message}");
    Ok(())
}

/// Soft-delete, pause or resume an item.
pub async fn watch_toggle(state: &AppState, item: &str, action: WatchToggle) -> Result<()> {
    let item_id = parse_item(item)?;
    let found = match action {
        WatchToggle::Remove => state.db.deactivate(&item_id).await?,
        WatchToggle::Pause => state.db.pause(&item_id).await?,
        WatchToggle::Resume => state.db.resume(&item_id).await?,
    };
    if !found {
        bail!("{item_id} is not on the watch-list");
    }
    println!("{item_id}: {}", action.past_tense());
    Ok(())
}

/// Print the watch-list.
pub async fn watch_list(state: &AppState) -> Result<()> {
    print_json(&state.db.watch_entries().await?)
}

/// Watch-list state changes.
#[derive(Debug, Clone, Copy)]
pub enum WatchToggle {
    Remove,
    Pause,
    Resume,
}

impl WatchToggle {
    fn past_tense(self) -> &'static str {
        match self {
            Self::Remove => "removed",
            Self::Pause => "paused",
            Self::Resume => "resumed",
        }
    }
}
