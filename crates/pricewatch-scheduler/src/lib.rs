//! Watch cadences and due-time computation.
//!
//! Decides when a watched item should next be crawled and when the daily
//! crawl fires.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod jobs;
pub mod scheduler;

pub use jobs::{Cadence, WatchEntry};
pub use scheduler::{is_due, next_daily_run, sleep_until_daily};
