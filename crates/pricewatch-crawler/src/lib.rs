//! Pricewatch Crawler - pooled, paced batch crawling.
//!
//! Drives a work list of items through a bounded [`ProfilePool`] of browser
//! sessions. Each item is crawled by a small state machine that always leaves
//! exactly one snapshot behind; items run concurrently within a batch, and
//! batches run one after another with a pacing delay in between.
//!
//! # Example
//!
//! ```rust,ignore
//! use pricewatch_crawler::{CrawlOrchestrator, WorkItem};
//! use std::time::Duration;
//!
//! let orchestrator = CrawlOrchestrator::from_config(extractor, store, dispatcher, &config)?;
//! let stats = orchestrator
//!     .run_batch(vec![WorkItem::new(item_id)], 10, Duration::from_secs(5))
//!     .await?;
//! println!("{} succeeded, {} failed", stats.successful, stats.failed);
//! ```
//!
//! [`ProfilePool`]: pricewatch_browser::ProfilePool

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod batch;
#[allow(missing_docs)]
pub mod error;
pub mod orchestrator;
pub mod stats;
pub mod task;

pub use batch::run_chunked;
pub use error::{CrawlError, Result};
pub use orchestrator::CrawlOrchestrator;
pub use stats::BatchStats;
pub use task::{crawl_item, CrawlOutcome, CrawlStage, CrawlState, WorkItem};
