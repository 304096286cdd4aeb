//! Error types for the event log.

use eventlease_types::ErrorKind;

/// Errors that can occur during event log operations.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// A required field was missing or a bound was out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A database operation failed.
    #[error("event log database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("event log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LogError {
    /// Classifies this error for the boundary layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Database(_) | Self::Serialization(_) => ErrorKind::Internal,
        }
    }
}
