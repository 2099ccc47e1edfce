use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation failed: {0}")]
    NavigationError(String),

    #[error("session setup failed: {0}")]
    SetupError(String),

    #[error("extraction failed: {0}")]
    ExtractionError(String),

    #[error("profile pool error: {0}")]
    PoolError(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("failed to read script {path}: {source}")]
    Script {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
