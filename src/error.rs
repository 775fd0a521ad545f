//! Error types for slot-retention

use thiserror::Error;

/// Errors that can occur while loading logs or computing features
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Failed to parse log record: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
