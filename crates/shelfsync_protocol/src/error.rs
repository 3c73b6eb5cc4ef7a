//! Error types for protocol validation and decoding.

use crate::action::ActionType;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while validating or decoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A sync batch carried no change records.
    #[error("change batch is empty")]
    EmptyBatch,

    /// A sync batch exceeded the configured record limit.
    #[error("change batch too large: {len} > {max}")]
    BatchTooLarge {
        /// Records in the batch.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// An action name exceeded the length limit.
    #[error("action name too long: {len} > {max}")]
    ActionTooLong {
        /// Length of the submitted name.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The action name is not a known [`ActionType`].
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// A remove/update action arrived without an `isarId`.
    #[error("{0} requires an isarId")]
    MissingIsarId(ActionType),

    /// The record payload does not match the entity schema.
    #[error("malformed {action} payload: {source}")]
    MalformedPayload {
        /// Action whose payload failed to parse.
        action: ActionType,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// A message body failed to decode.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A submitted document failed to parse.
    #[error("document error: {0}")]
    Document(#[from] shelfsync_model::ModelError),
}

impl ProtocolError {
    /// Returns true if the error rejects a whole batch before any mutation.
    pub fn is_batch_rejection(&self) -> bool {
        matches!(
            self,
            ProtocolError::EmptyBatch
                | ProtocolError::BatchTooLarge { .. }
                | ProtocolError::ActionTooLong { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_rejections() {
        assert!(ProtocolError::EmptyBatch.is_batch_rejection());
        assert!(ProtocolError::BatchTooLarge { len: 5, max: 2 }.is_batch_rejection());
        assert!(!ProtocolError::UnknownAction("X".into()).is_batch_rejection());
        assert!(!ProtocolError::MissingIsarId(ActionType::UpdateItem).is_batch_rejection());
    }

    #[test]
    fn error_display() {
        let err = ProtocolError::MissingIsarId(ActionType::RemoveChapter);
        assert_eq!(err.to_string(), "REMOVE_CHAPTER requires an isarId");

        let err = ProtocolError::BatchTooLarge { len: 10, max: 5 };
        let msg = err.to_string();
        assert!(msg.contains("10"));
        assert!(msg.contains("5"));
    }
}
