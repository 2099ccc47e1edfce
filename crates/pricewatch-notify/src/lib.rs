//! Pricewatch Notify - change-set formatting and delivery.
//!
//! The orchestrator hands every non-empty change-set to a
//! [`NotificationDispatcher`]. Delivery failures are the caller's to log;
//! they never fail a crawl.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

#[allow(missing_docs)]
pub mod error;
pub mod sender;
pub mod templates;

pub use error::{NotifyError, Result};
pub use sender::{
    dispatcher_from_config, DisabledDispatcher, LogDispatcher, NotificationDispatcher,
    WebhookDispatcher, WebhookPayload,
};
pub use templates::{render_change_message, ChangeMessage};
