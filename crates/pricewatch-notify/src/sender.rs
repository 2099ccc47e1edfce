//! Notification delivery.

use crate::error::{NotifyError, Result};
use crate::templates::{render_change_message, ChangeMessage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricewatch_core::{ItemId, NotificationConfig, Snapshot};
use pricewatch_diff::ChangeSet;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Delivers change-sets to a consumer.
///
/// Callers treat delivery as fire-and-forget: an error is logged by the
/// orchestrator and never fails the crawl that produced the change-set.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Deliver one change-set together with the snapshot that produced it.
    async fn notify(&self, item_id: &ItemId, changes: &ChangeSet, latest: &Snapshot)
        -> Result<()>;
}

/// Writes rendered messages to the log.
#[derive(Debug, Clone, Default)]
pub struct LogDispatcher {
    link_template: Option<String>,
}

impl LogDispatcher {
    /// A log dispatcher without item links.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a link built from `template` (`{item}` is replaced).
    #[must_use]
    pub fn with_link_template(mut self, template: impl Into<String>) -> Self {
        self.link_template = Some(template.into());
        self
    }
}

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn notify(
        &self,
        item_id: &ItemId,
        changes: &ChangeSet,
        latest: &Snapshot,
    ) -> Result<()> {
        let link = self.link_template.as_deref().map(|t| link_for(t, item_id));
        let message = render_change_message(changes, latest, link.as_deref());
        tracing::info!("{}\n{}", message.subject, message.body);
        Ok(())
    }
}

/// Drops every notification. Used when notifications are disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledDispatcher;

#[async_trait]
impl NotificationDispatcher for DisabledDispatcher {
    async fn notify(&self, item_id: &ItemId, changes: &ChangeSet, _: &Snapshot) -> Result<()> {
        tracing::debug!(
            "Notifications disabled, dropping {} changes for {}",
            changes.len(),
            item_id
        );
        Ok(())
    }
}

/// JSON body posted by [`WebhookDispatcher`].
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    /// Item the change-set belongs to
    pub item_id: &'a ItemId,
    /// Rendered one-line summary
    pub subject: &'a str,
    /// Rendered multi-line text
    pub text: &'a str,
    /// Capture time of the latest snapshot
    pub captured_at: DateTime<Utc>,
    /// The structured change-set
    pub changes: &'a ChangeSet,
}

/// Posts change-sets as JSON to a webhook URL.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: Client,
    url: String,
    link_template: Option<String>,
}

impl WebhookDispatcher {
    /// Create a dispatcher posting to `url`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            link_template: None,
        })
    }

    /// Append a link built from `template` (`{item}` is replaced).
    #[must_use]
    pub fn with_link_template(mut self, template: impl Into<String>) -> Self {
        self.link_template = Some(template.into());
        self
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn notify(
        &self,
        item_id: &ItemId,
        changes: &ChangeSet,
        latest: &Snapshot,
    ) -> Result<()> {
        let link = self.link_template.as_deref().map(|t| link_for(t, item_id));
        let ChangeMessage { subject, body } =
            render_change_message(changes, latest, link.as_deref());

        let payload = WebhookPayload {
            item_id,
            subject: &subject,
            text: &body,
            captured_at: latest.captured_at,
            changes,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Delivered {} changes for {} to webhook", changes.len(), item_id);
        Ok(())
    }
}

/// Pick a dispatcher for the configured notification settings.
///
/// Disabled → [`DisabledDispatcher`]; a webhook URL → [`WebhookDispatcher`];
/// otherwise [`LogDispatcher`]. `link_template` is the item page URL template.
pub fn dispatcher_from_config(
    config: &NotificationConfig,
    link_template: &str,
) -> Result<Arc<dyn NotificationDispatcher>> {
    if !config.enabled {
        return Ok(Arc::new(DisabledDispatcher));
    }
    match config.webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Ok(Arc::new(
            WebhookDispatcher::new(url.trim())?.with_link_template(link_template),
        )),
        _ => Ok(Arc::new(
            LogDispatcher::new().with_link_template(link_template),
        )),
    }
}

fn link_for(template: &str, item_id: &ItemId) -> String {
    template.replace("{item}", item_id.as_str())
}
