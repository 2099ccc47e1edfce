use pricewatch_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{field}' is not numeric and cannot take a threshold")]
    NotNumeric { field: String },

    #[error("invalid threshold {value} for field '{field}'")]
    InvalidThreshold { field: String, value: f64 },

    #[error("snapshot store error: {0}")]
    Store(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, DiffError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DiffError::NotNumeric {
            field: "title".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "field 'title' is not numeric and cannot take a threshold"
        );
    }
}
