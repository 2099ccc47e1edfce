use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Storage error: {0}")]
    Store(#[from] pricewatch_core::CoreError),

    #[error("Diff error: {0}")]
    Diff(#[from] pricewatch_diff::DiffError),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
