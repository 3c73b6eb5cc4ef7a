//! Request and response messages exchanged with clients.

use crate::change::SyncRequest;
use crate::changed_items::ChangedItems;
use crate::error::ProtocolResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shelfsync_model::{BackupDocument, ModelError};

/// A full document as submitted by a client: either its JSON text or the
/// JSON object itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupPayload(pub Value);

impl BackupPayload {
    /// Wraps document text.
    pub fn text(text: impl Into<String>) -> Self {
        Self(Value::String(text.into()))
    }

    /// Wraps a document.
    pub fn document(document: &BackupDocument) -> ProtocolResult<Self> {
        Ok(Self(serde_json::to_value(document)?))
    }

    /// Parses the payload as a document.
    pub fn parse(&self) -> ProtocolResult<BackupDocument> {
        match &self.0 {
            Value::String(text) => Ok(BackupDocument::from_json(text)?),
            Value::Object(_) => Ok(serde_json::from_value(self.0.clone())?),
            other => Err(ModelError::invalid(format!(
                "backupData must be a string or object, got {}",
                json_kind(other)
            ))
            .into()),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Body of a bulk merge request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    /// The client's full document.
    pub backup_data: BackupPayload,
    /// Explicit deletion and update intents.
    #[serde(default)]
    pub changed_items: ChangedItems,
}

/// Body of a full upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// The document replacing the stored one.
    pub backup_data: BackupPayload,
}

/// Fingerprint reply for check and sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashResponse {
    /// Lowercase hex SHA-256.
    pub hash: String,
}

/// Document reply for merge, upload and download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResponse {
    /// Stored document text.
    pub backup_data: String,
}

/// Error reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// True if the request itself was at fault.
    pub client_error: bool,
}

/// A request addressed to the sync server on behalf of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShelfMessage {
    /// Create the empty document if none exists.
    Initialize,
    /// Fingerprint the stored document.
    Check,
    /// Replay an incremental batch.
    Sync(SyncRequest),
    /// Merge a full client document.
    Merge(MergeRequest),
    /// Replace the stored document.
    Upload(UploadRequest),
    /// Fetch the stored document.
    Download,
    /// Drop change log entries older than a client timestamp.
    PruneTimeline {
        /// Entries with a smaller `clientDate` are removed.
        before: i64,
    },
}

impl ShelfMessage {
    /// Returns the message name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ShelfMessage::Initialize => "initialize",
            ShelfMessage::Check => "check",
            ShelfMessage::Sync(_) => "sync",
            ShelfMessage::Merge(_) => "merge",
            ShelfMessage::Upload(_) => "upload",
            ShelfMessage::Download => "download",
            ShelfMessage::PruneTimeline { .. } => "pruneTimeline",
        }
    }
}

/// Reply to a [`ShelfMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShelfReply {
    /// The request succeeded with nothing to return.
    Ack,
    /// A fingerprint.
    Hash(HashResponse),
    /// A stored document.
    Backup(BackupResponse),
    /// Number of change log entries removed.
    Pruned {
        /// Removed entries.
        removed: usize,
    },
    /// The request failed.
    Error(ErrorResponse),
}

impl ShelfReply {
    /// Returns true for [`ShelfReply::Error`].
    pub fn is_error(&self) -> bool {
        matches!(self, ShelfReply::Error(_))
    }
}
