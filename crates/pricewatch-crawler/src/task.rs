//! Single-item crawl task.
//!
//! One crawl drives a leased session through
//! `Start → Navigate → Setup (once per session) → Extract → Persist → Done`.
//! Any stage may fall into `Failed`; a failure before `Persist` still writes
//! one failed snapshot so every attempt leaves exactly one record. The task
//! never returns an error: everything is folded into a [`CrawlOutcome`].

use pricewatch_browser::{Extractor, ProfilePool};
use pricewatch_core::{ItemId, Snapshot, SnapshotStore, WatchRunUpdate};
use pricewatch_scheduler::{Cadence, WatchEntry};
use serde::Serialize;
use std::fmt;

/// One item scheduled for crawling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Item to crawl
    pub item_id: ItemId,
    /// Cadence used to advance the watch entry after a successful crawl
    pub cadence: Cadence,
}

impl WorkItem {
    /// A daily work item.
    pub fn new(item_id: ItemId) -> Self {
        Self {
            item_id,
            cadence: Cadence::Daily,
        }
    }

    /// Override the cadence.
    #[must_use]
    pub fn with_cadence(mut self, cadence: Cadence) -> Self {
        self.cadence = cadence;
        self
    }
}

impl From<&WatchEntry> for WorkItem {
    fn from(entry: &WatchEntry) -> Self {
        Self {
            item_id: entry.item_id.clone(),
            cadence: entry.cadence,
        }
    }
}

/// Stage at which a crawl failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStage {
    /// Leasing or opening the session
    Open,
    /// Loading the item page
    Navigate,
    /// One-time session setup
    Setup,
    /// Reading product fields
    Extract,
    /// Writing the snapshot or advancing the watch entry
    Persist,
}

impl fmt::Display for CrawlStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::Navigate => "navigate",
            Self::Setup => "setup",
            Self::Extract => "extract",
            Self::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Crawl state machine.
#[derive(Debug)]
pub enum CrawlState {
    /// Session leased, nothing done yet
    Start,
    /// Loading the page
    Navigate,
    /// Running one-time setup on a fresh session
    Setup,
    /// Reading the page
    Extract,
    /// Writing the successful snapshot
    Persist(Snapshot),
    /// Snapshot written and watch entry advanced
    Done(Snapshot),
    /// Terminal failure
    Failed {
        /// Stage that failed
        stage: CrawlStage,
        /// Error text recorded on the failed snapshot
        error: String,
    },
}

/// Result of one crawl attempt.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlOutcome {
    /// Item crawled
    pub item_id: ItemId,
    /// Whether a successful snapshot was persisted
    pub success: bool,
    /// Error text for failed attempts
    pub error: Option<String>,
    /// Stage a failed attempt stopped at
    pub failed_stage: Option<CrawlStage>,
    /// Profile the crawl ran on
    pub profile_id: usize,
    /// Port of the session used, if one was leased
    pub port: Option<u16>,
    /// Number of reportable changes found after the crawl
    pub changes: usize,
    /// The persisted successful snapshot
    #[serde(skip)]
    pub snapshot: Option<Snapshot>,
}

impl CrawlOutcome {
    fn succeeded(item_id: ItemId, profile_id: usize, port: u16, snapshot: Snapshot) -> Self {
        Self {
            item_id,
            success: true,
            error: None,
            failed_stage: None,
            profile_id,
            port: Some(port),
            changes: 0,
            snapshot: Some(snapshot),
        }
    }

    fn failed(
        item_id: ItemId,
        profile_id: usize,
        port: Option<u16>,
        stage: CrawlStage,
        error: String,
    ) -> Self {
        Self {
            item_id,
            success: false,
            error: Some(error),
            failed_stage: Some(stage),
            profile_id,
            port,
            changes: 0,
            snapshot: None,
        }
    }

    /// Outcome for a task that panicked. Nothing was persisted for it.
    pub(crate) fn panicked(item_id: ItemId, profile_id: usize, message: &str) -> Self {
        Self {
            item_id,
            success: false,
            error: Some(format!("task panicked: {message}")),
            failed_stage: None,
            profile_id,
            port: None,
            changes: 0,
            snapshot: None,
        }
    }
}

/// Crawl one item on `profile_id`.
///
/// The profile is held for the whole crawl, so two calls on the same profile
/// run one after the other.
pub async fn crawl_item<E: Extractor>(
    pool: &ProfilePool<E>,
    store: &dyn SnapshotStore,
    item: &WorkItem,
    profile_id: usize,
) -> CrawlOutcome {
    let item_id = &item.item_id;

    let mut lease = match pool.get_or_create(profile_id).await {
        Ok(lease) => lease,
        Err(e) => {
            return fail(store, item_id, profile_id, None, CrawlStage::Open, e.to_string()).await;
        }
    };
    let port = lease.port;
    let extractor = pool.extractor();

    tracing::debug!("Crawling {} on profile {} (port {})", item_id, profile_id, port);

    let mut state = CrawlState::Start;
    loop {
        state = match state {
            CrawlState::Start => CrawlState::Navigate,

            CrawlState::Navigate => match extractor.navigate(&mut lease.session, item_id).await {
                Ok(()) if lease.setup_done => CrawlState::Extract,
                Ok(()) => CrawlState::Setup,
                Err(e) => CrawlState::Failed {
                    stage: CrawlStage::Navigate,
                    error: e.to_string(),
                },
            },

            CrawlState::Setup => match extractor.one_time_setup(&mut lease.session).await {
                Ok(()) => {
                    lease.setup_done = true;
                    CrawlState::Extract
                }
                Err(e) => {
                    tracing::warn!("One-time setup failed on profile {}: {}", profile_id, e);
                    CrawlState::Failed {
                        stage: CrawlStage::Setup,
                        error: e.to_string(),
                    }
                }
            },

            CrawlState::Extract => match extractor.extract(&mut lease.session).await {
                Ok(fields) => CrawlState::Persist(Snapshot::success(item_id.clone(), fields)),
                Err(e) => CrawlState::Failed {
                    stage: CrawlStage::Extract,
                    error: e.to_string(),
                },
            },

            CrawlState::Persist(snapshot) => match persist_success(store, item, &snapshot).await {
                Ok(()) => CrawlState::Done(snapshot),
                Err(error) => CrawlState::Failed {
                    stage: CrawlStage::Persist,
                    error,
                },
            },

            CrawlState::Done(snapshot) => {
                tracing::debug!("Crawled {} on profile {}", item_id, profile_id);
                return CrawlOutcome::succeeded(item_id.clone(), profile_id, port, snapshot);
            }

            CrawlState::Failed { stage, error } => {
                drop(lease);
                return fail(store, item_id, profile_id, Some(port), stage, error).await;
            }
        };
    }
}

/// Write the snapshot, then advance the watch entry per its cadence.
async fn persist_success(
    store: &dyn SnapshotStore,
    item: &WorkItem,
    snapshot: &Snapshot,
) -> std::result::Result<(), String> {
    store
        .save_snapshot(snapshot)
        .await
        .map_err(|e| format!("failed to save snapshot: {e}"))?;

    let last_run = snapshot.captured_at;
    let update = WatchRunUpdate::new(last_run, item.cadence.next_due(last_run))
        .map_err(|e| e.to_string())?;

    let updated = store
        .update_watch_entry(&item.item_id, update)
        .await
        .map_err(|e| format!("failed to update watch entry: {e}"))?;
    if !updated {
        tracing::debug!("{} has no watch entry; nothing to advance", item.item_id);
    }
    Ok(())
}

/// Record a failed attempt. A persist-stage failure writes nothing more.
async fn fail(
    store: &dyn SnapshotStore,
    item_id: &ItemId,
    profile_id: usize,
    port: Option<u16>,
    stage: CrawlStage,
    error: String,
) -> CrawlOutcome {
    let mut error = format!("{stage}: {error}");

    if stage != CrawlStage::Persist {
        let snapshot = Snapshot::failure(item_id.clone(), error.clone());
        if let Err(e) = store.save_snapshot(&snapshot).await {
            error = format!("{error}; failed to save failure snapshot: {e}");
        }
    }

    tracing::error!("Crawl of {} failed: {}", item_id, error);
    CrawlOutcome::failed(item_id.clone(), profile_id, port, stage, error)
}
