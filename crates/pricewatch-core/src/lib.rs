//! Pricewatch Core - Foundation crate for the Pricewatch crawler.
//!
//! This crate provides shared types, error handling, configuration management,
//! and the storage seam that the crawl orchestrator and diff engine depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes (`ItemId`) and time windows
//! - [`snapshot`] - The fixed product schema and per-attempt snapshots
//! - [`store`] - The `SnapshotStore` trait implemented by the database layer
//!
//! # Example
//!
//! ```rust
//! use pricewatch_core::{AppConfig, ItemId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! config.validate()?;
//!
//! let item = ItemId::new("b019qzbs10")?;
//! assert_eq!(item.as_str(), "B019QZBS10");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BatchConfig, BrowserConfig, DatabaseConfig, DiffConfig, NotificationConfig,
    PoolConfig, PriorWindow, ScheduleConfig,
};
pub use error::{ConfigError, ConfigResult, CoreError, Result};
pub use snapshot::{ProductFields, Snapshot};
pub use store::{SnapshotStore, WatchRunUpdate};
pub use types::{ItemId, TimeWindow};
