//! Configuration management for Pricewatch.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/pricewatch/config.toml` (or platform
/// equivalent). If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Worker session pool settings
    pub pool: PoolConfig,
    /// Batch scheduling settings
    pub batch: BatchConfig,
    /// Change detection settings
    pub diff: DiffConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Recurring crawl settings
    pub schedule: ScheduleConfig,
    /// Notification settings
    pub notifications: NotificationConfig,
    /// Database settings
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from the default path, falling back to defaults.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `PRICEWATCH_POOL_CAPACITY`: Override the session pool capacity
    /// - `PRICEWATCH_BATCH_SIZE`: Override the batch size
    /// - `PRICEWATCH_PACING_SECS`: Override the delay between batches
    /// - `PRICEWATCH_HEADLESS`: Override browser headless mode (true/false)
    /// - `PRICEWATCH_DATABASE`: Override the database path
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `PRICEWATCH_*` environment overrides in place.
    pub fn apply_env(&mut self) {
        if let Some(capacity) = env_parse("PRICEWATCH_POOL_CAPACITY") {
            self.pool.capacity = capacity;
            tracing::debug!("Override pool.capacity from env: {}", capacity);
        }

        if let Some(size) = env_parse("PRICEWATCH_BATCH_SIZE") {
            self.batch.batch_size = size;
            tracing::debug!("Override batch.batch_size from env: {}", size);
        }

        if let Some(secs) = env_parse("PRICEWATCH_PACING_SECS") {
            self.batch.pacing_delay_secs = secs;
            tracing::debug!("Override batch.pacing_delay_secs from env: {}", secs);
        }

        if let Some(headless) = env_parse("PRICEWATCH_HEADLESS") {
            self.browser.headless = headless;
            tracing::debug!("Override browser.headless from env: {}", headless);
        }

        if let Ok(path) = std::env::var("PRICEWATCH_DATABASE") {
            tracing::debug!("Override database.path from env: {}", path);
            self.database.path = Some(PathBuf::from(path));
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.pool.capacity == 0 {
            return Err(invalid("pool.capacity", "must be at least 1"));
        }
        if self.pool.port_start > self.pool.port_end {
            return Err(invalid(
                "pool.port_start",
                &format!(
                    "range {}..={} is empty",
                    self.pool.port_start, self.pool.port_end
                ),
            ));
        }
        let ports = usize::from(self.pool.port_end - self.pool.port_start) + 1;
        if self.pool.capacity > ports {
            return Err(invalid(
                "pool.capacity",
                &format!(
                    "{} exceeds the {} ports in {}..={}",
                    self.pool.capacity, ports, self.pool.port_start, self.pool.port_end
                ),
            ));
        }
        if self.batch.batch_size == 0 {
            return Err(invalid("batch.batch_size", "must be at least 1"));
        }
        if let Some((field, threshold)) = self
            .diff
            .thresholds
            .iter()
            .find(|(_, t)| !t.is_finite() || **t < 0.0)
        {
            return Err(invalid(
                &format!("diff.thresholds.{field}"),
                &format!("{threshold} is not a non-negative number"),
            ));
        }
        ScheduleConfig::parse_time(&self.schedule.daily_crawl_time)?;
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/pricewatch/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/pricewatch`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Resolve the database path, defaulting into the data directory.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("pricewatch.db")),
        }
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "pricewatch", "pricewatch").ok_or(ConfigError::NoConfigDir)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|val| val.parse().ok())
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Worker session pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of resident sessions
    pub capacity: usize,
    /// First port of the debugging port range (inclusive)
    pub port_start: u16,
    /// Last port of the debugging port range (inclusive)
    pub port_end: u16,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            port_start: 9222,
            port_end: 9999,
        }
    }
}

/// Batch scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Items crawled concurrently per batch
    pub batch_size: usize,
    /// Pause between batches in seconds
    pub pacing_delay_secs: u64,
}

impl BatchConfig {
    /// Pacing delay as a `Duration`.
    #[must_use]
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_secs(self.pacing_delay_secs)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            pacing_delay_secs: 5,
        }
    }
}

/// Which stored snapshot a new observation is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorWindow {
    /// Newest successful snapshot from the previous UTC calendar day
    PreviousDay,
    /// Newest successful snapshot within `lookback_hours` before now
    Lookback,
}

/// Change detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Comparison window for the prior snapshot
    pub prior_window: PriorWindow,
    /// Hours covered by `PriorWindow::Lookback`
    pub lookback_hours: u32,
    /// Per-field numeric threshold overrides, keyed by field name
    pub thresholds: BTreeMap<String, f64>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            prior_window: PriorWindow::PreviousDay,
            lookback_hours: 24,
            thresholds: BTreeMap::new(),
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Item page URL; `{item}` is replaced with the item ID
    pub url_template: String,
    /// JavaScript run once per session after the first navigation
    pub setup_script: Option<PathBuf>,
    /// JavaScript expression evaluating to the product fields object
    pub extract_script: Option<PathBuf>,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Wait after navigation before extracting, in milliseconds
    pub settle_delay_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            url_template: "https://www.amazon.com/dp/{item}".to_string(),
            setup_script: None,
            extract_script: None,
            navigation_timeout_secs: 30,
            settle_delay_ms: 3000,
        }
    }
}

/// Recurring crawl settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Time of the daily crawl, `HH:MM` in UTC
    pub daily_crawl_time: String,
}

impl ScheduleConfig {
    /// Parse an `HH:MM` string into hour and minute.
    pub fn parse_time(value: &str) -> ConfigResult<(u32, u32)> {
        let parsed = value
            .split_once(':')
            .and_then(|(h, m)| Some((h.trim().parse().ok()?, m.trim().parse().ok()?)));

        match parsed {
            Some((hour, minute)) if hour < 24 && minute < 60 => Ok((hour, minute)),
            _ => Err(invalid(
                "schedule.daily_crawl_time",
                &format!("expected HH:MM, got '{value}'"),
            )),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            daily_crawl_time: "09:00".to_string(),
        }
    }
}

/// Notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Dispatch change notifications at all
    pub enabled: bool,
    /// Optional webhook receiving change notifications as JSON
    pub webhook_url: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
        }
    }
}

/// Database settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; defaults to `<data dir>/pricewatch.db`
    pub path: Option<PathBuf>,
}
