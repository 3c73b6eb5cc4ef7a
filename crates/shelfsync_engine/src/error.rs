//! Error types for the reconciliation engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur during merge, patch or import.
///
/// Per-record problems inside a patch batch are not errors; they are
/// logged and counted in the report. Only failures that must abort the
/// whole operation surface here.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The change log could not be read or appended.
    #[error("storage error: {0}")]
    Storage(#[from] shelfsync_storage::StorageError),

    /// A document could not be parsed or serialized.
    #[error("document error: {0}")]
    Document(#[from] shelfsync_model::ModelError),

    /// A request failed boundary validation.
    #[error("protocol error: {0}")]
    Protocol(#[from] shelfsync_protocol::ProtocolError),

    /// An import archive entry could not be decoded.
    #[error("import entry {entry}: {source}")]
    Import {
        /// Archive entry name.
        entry: String,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

impl EngineError {
    /// Returns true if the error was caused by client-supplied input.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EngineError::Document(_) | EngineError::Protocol(_) | EngineError::Import { .. }
        )
    }
}
