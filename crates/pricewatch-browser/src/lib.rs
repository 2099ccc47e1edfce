//! Pooled browser sessions for page extraction.
//!
//! Provides the [`Extractor`] seam, a Chromium implementation, and the
//! [`ProfilePool`]/[`PortAllocator`] pair that keeps a bounded number of
//! sessions alive between crawls.

pub mod engine;
pub mod error;
pub mod extractor;
pub mod fingerprint;
pub mod ports;
pub mod profile_pool;

pub use engine::{ChromiumExtractor, ChromiumSession};
pub use error::{BrowserError, Result};
pub use extractor::{item_url, Extractor};
pub use fingerprint::FingerprintConfig;
pub use ports::PortAllocator;
pub use profile_pool::{Profile, ProfileLease, ProfilePool};
