//! Error types for the medimini_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for medimini_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A timestamp could not be parsed as an ISO-8601 point in time
    #[error("Invalid timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },

    /// Input rejected before it reached the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backing store could not be read or written
    #[error("Store error: {0}")]
    Store(String),
}
