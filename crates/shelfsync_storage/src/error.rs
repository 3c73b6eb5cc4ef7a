//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored record could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored file is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the data directory lock.
    #[error("data directory is locked by another process")]
    Locked,

    /// The data directory path is unusable.
    #[error("invalid data directory: {0}")]
    InvalidDirectory(String),
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StorageError::corrupted("bad timeline line 3");
        assert_eq!(err.to_string(), "storage corrupted: bad timeline line 3");

        let err: StorageError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().starts_with("I/O error"));
    }
}
