use crate::error::{BrowserError, Result};
use crate::extractor::{item_url, Extractor};
use crate::fingerprint::FingerprintConfig;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use pricewatch_core::{BrowserConfig, ItemId, ProductFields};
use std::path::Path;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Extraction script used when no `extract_script` is configured.
pub const DEFAULT_EXTRACT_SCRIPT: &str = include_str!("../scripts/extract.js");

/// One Chromium process with a single working tab.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    fingerprint: FingerprintConfig,
    port: u16,
}

impl ChromiumSession {
    /// Fingerprint this session presents.
    pub fn fingerprint(&self) -> &FingerprintConfig {
        &self.fingerprint
    }

    /// Remote debugging port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Headless Chromium extractor driven over the DevTools protocol
#[derive(Debug, Clone)]
pub struct ChromiumExtractor {
    config: BrowserConfig,
    setup_script: Option<String>,
    extract_script: String,
}

impl ChromiumExtractor {
    /// Create an extractor, loading any configured scripts from disk
    pub fn new(config: BrowserConfig) -> Result<Self> {
        let setup_script = config.setup_script.as_deref().map(read_script).transpose()?;
        let extract_script = match config.extract_script.as_deref() {
            Some(path) => read_script(path)?,
            None => DEFAULT_EXTRACT_SCRIPT.to_string(),
        };

        Ok(Self {
            config,
            setup_script,
            extract_script,
        })
    }

    fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.config.navigation_timeout_secs)
    }
}

fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| BrowserError::Script {
        path: path.display().to_string(),
        source,
    })
}

#[async_trait::async_trait]
impl Extractor for ChromiumExtractor {
    type Session = ChromiumSession;

    async fn open_session(&self, port: u16) -> Result<ChromiumSession> {
        let fingerprint = FingerprintConfig::randomized();
        let profile_dir = std::env::temp_dir().join(format!("pricewatch-profile-{port}"));

        let mut builder = LaunchConfig::builder()
            .no_sandbox()
            .port(port)
            .user_data_dir(profile_dir)
            .window_size(fingerprint.viewport_width, fingerprint.viewport_height)
            .arg(format!("--user-agent={}", fingerprint.user_agent))
            .arg("--disable-blink-features=AutomationControlled");
        if !self.config.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(BrowserError::ChromiumError(e.to_string()));
            }
        };

        tracing::debug!("Chromium session on port {} ({})", port, fingerprint.user_agent);
        Ok(ChromiumSession {
            browser,
            page,
            handler,
            fingerprint,
            port,
        })
    }

    async fn close_session(&self, mut session: ChromiumSession) -> Result<()> {
        let closed = session.browser.close().await;
        let _ = session.browser.wait().await;
        session.handler.abort();
        closed
            .map(|_| ())
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn navigate(&self, session: &mut ChromiumSession, item_id: &ItemId) -> Result<()> {
        let url = item_url(&self.config.url_template, item_id);
        let timeout = self.navigation_timeout();

        match tokio::time::timeout(timeout, session.page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(BrowserError::NavigationError(format!("{url}: {e}"))),
            Err(_) => {
                return Err(BrowserError::Timeout(format!(
                    "navigation to {url} after {}s",
                    timeout.as_secs()
                )))
            }
        }

        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        Ok(())
    }

    async fn one_time_setup(&self, session: &mut ChromiumSession) -> Result<()> {
        let Some(script) = &self.setup_script else {
            tracing::debug!("No setup script configured, skipping session setup");
            return Ok(());
        };

        session
            .page
            .evaluate(script.as_str())
            .await
            .map_err(|e| BrowserError::SetupError(e.to_string()))?;
        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        Ok(())
    }

    async fn extract(&self, session: &mut ChromiumSession) -> Result<ProductFields> {
        let value: serde_json::Value = session
            .page
            .evaluate(self.extract_script.as_str())
            .await
            .map_err(|e| BrowserError::ExtractionError(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::ExtractionError(format!("script result: {e}")))?;

        let fields: ProductFields = serde_json::from_value(value)
            .map_err(|e| BrowserError::ExtractionError(format!("unexpected field shape: {e}")))?;

        if fields == ProductFields::default() {
            return Err(BrowserError::ExtractionError(
                "page contained no product data".to_string(),
            ));
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_script_is_bundled() {
        let extractor = ChromiumExtractor::new(BrowserConfig::default()).unwrap();
        assert!(extractor.extract_script.contains("productTitle"));
        assert!(extractor.setup_script.is_none());
    }

    #[test]
    fn test_missing_script_file_is_an_error() {
        let config = BrowserConfig {
            extract_script: Some("/nonexistent/extract.js".into()),
            ..BrowserConfig::default()
        };
        let err = ChromiumExtractor::new(config).unwrap_err();
        assert!(matches!(err, BrowserError::Script { .. }));
    }
}
