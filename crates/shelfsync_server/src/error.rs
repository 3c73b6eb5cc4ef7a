//! Error types for the sync server.

use shelfsync_engine::EngineError;
use shelfsync_model::ModelError;
use shelfsync_protocol::{ErrorResponse, ProtocolError};
use shelfsync_storage::StorageError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The user has no stored document to patch or download.
    #[error("no remote data")]
    NoRemoteData,

    /// Storage failure; the transaction was rolled back.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A submitted or stored document could not be parsed.
    #[error("document error: {0}")]
    Document(#[from] ModelError),

    /// A request failed boundary validation.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Merge, patch or import failure.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::NoRemoteData
            | ServerError::Document(_)
            | ServerError::Protocol(_) => true,
            ServerError::Engine(err) => err.is_input_error(),
            ServerError::Storage(_) | ServerError::Internal(_) => false,
        }
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Builds the wire reply for this error.
    ///
    /// Server-side failures are reported generically.
    pub fn to_response(&self) -> ErrorResponse {
        let client_error = self.is_client_error();
        let error = if client_error {
            self.to_string()
        } else {
            "server error".to_string()
        };
        ErrorResponse {
            error,
            client_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::NoRemoteData.is_client_error());
        assert!(ServerError::from(ProtocolError::EmptyBatch).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(ServerError::from(StorageError::Locked).is_server_error());
        assert!(ServerError::from(EngineError::from(StorageError::Locked)).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
    }

    #[test]
    fn server_errors_are_reported_generically() {
        let reply = ServerError::from(StorageError::corrupted("line 3")).to_response();
        assert!(!reply.client_error);
        assert_eq!(reply.error, "server error");

        let reply = ServerError::NoRemoteData.to_response();
        assert!(reply.client_error);
        assert_eq!(reply.error, "no remote data");
    }
}
