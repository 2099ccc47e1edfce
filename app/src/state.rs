//! Process-wide state: configuration and the database, plus factories for
//! the components built on top of them.

use anyhow::{Context, Result};
use pricewatch_browser::ChromiumExtractor;
use pricewatch_core::{AppConfig, SnapshotStore};
use pricewatch_crawler::CrawlOrchestrator;
use pricewatch_db::Database;
use pricewatch_diff::DiffEngine;
use pricewatch_notify::dispatcher_from_config;
use std::path::Path;
use std::sync::Arc;

/// Loaded configuration and open database shared by every command.
pub struct AppState {
    /// Effective configuration (file, then environment overrides)
    pub config: AppConfig,
    /// Migrated database
    pub db: Arc<Database>,
}

impl AppState {
    /// Load configuration and open (and migrate) the database.
    pub async fn open(config_path: Option<&Path>) -> Result<Self> {
        let config =
            AppConfig::load_with_env(config_path).context("failed to load configuration")?;

        let db_path = config.database_path()?;
        tracing::info!("Database: {}", db_path.display());
        let db = Database::open(&db_path)
            .await
            .with_context(|| format!("failed to open database at {}", db_path.display()))?;

        Ok(Self {
            config,
            db: Arc::new(db),
        })
    }

    /// The database as a snapshot store.
    pub fn store(&self) -> Arc<dyn SnapshotStore> {
        Arc::clone(&self.db) as Arc<dyn SnapshotStore>
    }

    /// A diff engine over the database using the `[diff]` settings.
    pub fn diff_engine(&self) -> Result<DiffEngine> {
        Ok(DiffEngine::from_config(self.store(), &self.config.diff)?)
    }

    /// A Chromium-backed orchestrator. Browsers start lazily on first crawl.
    pub fn orchestrator(&self) -> Result<CrawlOrchestrator<ChromiumExtractor>> {
        let extractor = Arc::new(
            ChromiumExtractor::new(self.config.browser.clone())
                .context("failed to prepare browser extractor")?,
        );
        let dispatcher = dispatcher_from_config(
            &self.config.notifications,
            &self.config.browser.url_template,
        )?;

        Ok(CrawlOrchestrator::from_config(
            extractor,
            self.store(),
            dispatcher,
            &self.config,
        )?)
    }

    /// Close the database pool.
    pub async fn close(self) {
        self.db.as_ref().clone().close().await;
    }
}
