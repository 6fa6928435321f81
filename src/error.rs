//! Error types for har-replay

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for har-replay operations
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Errors that can occur in har-replay
#[derive(Debug, Error)]
pub enum ReplayError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Archive file could not be parsed
    #[error("Invalid archive {path}: {source}")]
    Archive {
        /// Path of the offending archive
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// Entry content could not be decoded (e.g. bad base64)
    #[error("Invalid entry content: {0}")]
    InvalidContent(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}
