//! Pricewatch Diff - typed snapshot comparison.
//!
//! Decides, field by field, whether a new observation of an item differs from
//! the prior one. Comparison is table-driven by a [`FieldRegistry`]:
//!
//! - **text**: whitespace-normalized equality
//! - **numeric**: absolute difference against a per-field threshold
//! - **list**: set equality, order ignored
//! - **structured**: JSON equality with empty stand-ins treated as missing
//!
//! Detected differences then pass through a pluggable
//! [`SignificanceFilter`]; the default reports everything.
//!
//! # Example
//!
//! ```rust,ignore
//! use pricewatch_diff::{ChangeResult, DiffEngine};
//!
//! let engine = DiffEngine::new(store);
//! if let ChangeResult::Changed(set) = engine.diff(&item_id).await? {
//!     for change in set.changes.values() {
//!         println!("{}: {:?} -> {:?}", change.field, change.old, change.new);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod changeset;
pub mod engine;
#[allow(missing_docs)]
pub mod error;
pub mod filter;
pub mod normalize;
pub mod registry;

pub use changeset::{ChangeResult, ChangeSet, FieldChange, HistoryEntry};
pub use engine::DiffEngine;
pub use error::{DiffError, Result};
pub use filter::{MagnitudeFilter, ReportAll, SignificanceFilter};
pub use normalize::FieldValue;
pub use registry::{FieldKind, FieldRegistry, FieldSpec};
