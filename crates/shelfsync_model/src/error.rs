//! Error types for the document model.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur while reading or writing a backup document.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The JSON text could not be parsed or produced.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but violates a structural rule.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl ModelError {
    /// Creates an invalid document error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidDocument(message.into())
    }
}
