use crate::error::Result;
use pricewatch_core::{ItemId, ProductFields};

/// Page automation capability driven by the crawl task.
///
/// The pool opens one session per profile and hands it to the crawl task
/// exclusively; implementations never see concurrent calls on one session.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync + 'static {
    /// Live browser state bound to one port
    type Session: Send + 'static;

    /// Start a session listening on `port`
    async fn open_session(&self, port: u16) -> Result<Self::Session>;

    /// Tear a session down
    async fn close_session(&self, session: Self::Session) -> Result<()>;

    /// Load the item's page
    async fn navigate(&self, session: &mut Self::Session, item_id: &ItemId) -> Result<()>;

    /// Per-session preparation that only needs to happen once
    async fn one_time_setup(&self, session: &mut Self::Session) -> Result<()>;

    /// Read the product fields from the loaded page
    async fn extract(&self, session: &mut Self::Session) -> Result<ProductFields>;
}

/// Build the page URL for an item from a template containing `{item}`.
pub fn item_url(template: &str, item_id: &ItemId) -> String {
    template.replace("{item}", item_id.as_str())
}
