//! Incremental change records and the sync request that carries them.

use crate::action::ActionType;
use crate::error::{ProtocolError, ProtocolResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shelfsync_model::EntityId;

/// Default cap on records per sync batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Default cap on the length of an action name.
pub const DEFAULT_MAX_ACTION_LEN: usize = 128;

/// One client-side mutation submitted for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    /// Action wire name. Kept as text so unknown actions survive decoding
    /// and can be skipped individually.
    pub action: String,
    /// Target entity id for remove/update actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isar_id: Option<EntityId>,
    /// JSON-encoded entity payload; empty for remove/clear.
    #[serde(default)]
    pub data: String,
    /// Client timestamp (ms since epoch), used for ordering and staleness.
    pub client_date: i64,
}

impl ChangeRecord {
    /// Creates a record.
    pub fn new(
        action: ActionType,
        isar_id: Option<EntityId>,
        data: impl Into<String>,
        client_date: i64,
    ) -> Self {
        Self {
            action: action.as_str().to_string(),
            isar_id,
            data: data.into(),
            client_date,
        }
    }

    /// Creates a record whose payload is the JSON encoding of `entity`.
    pub fn with_entity<T: Serialize>(
        action: ActionType,
        isar_id: Option<EntityId>,
        entity: &T,
        client_date: i64,
    ) -> ProtocolResult<Self> {
        Ok(Self::new(
            action,
            isar_id,
            serde_json::to_string(entity)?,
            client_date,
        ))
    }

    /// Returns the parsed action, or `None` if the name is unknown.
    pub fn action_type(&self) -> Option<ActionType> {
        ActionType::parse(&self.action)
    }

    /// Returns the target id of a remove/update action.
    pub fn target_id(&self, action: ActionType) -> ProtocolResult<EntityId> {
        self.isar_id.ok_or(ProtocolError::MissingIsarId(action))
    }

    /// Decodes the payload as the entity type the action targets.
    pub fn payload<T: DeserializeOwned>(&self, action: ActionType) -> ProtocolResult<T> {
        serde_json::from_str(&self.data)
            .map_err(|source| ProtocolError::MalformedPayload { action, source })
    }
}

/// Body of an incremental sync request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    /// Change records, in any order.
    pub changed_parts: Vec<ChangeRecord>,
}

impl SyncRequest {
    /// Creates a request.
    pub fn new(changed_parts: Vec<ChangeRecord>) -> Self {
        Self { changed_parts }
    }

    /// Validates the batch shape before any record is applied.
    pub fn validate(&self, max_records: usize, max_action_len: usize) -> ProtocolResult<()> {
        if self.changed_parts.is_empty() {
            return Err(ProtocolError::EmptyBatch);
        }
        if self.changed_parts.len() > max_records {
            return Err(ProtocolError::BatchTooLarge {
                len: self.changed_parts.len(),
                max: max_records,
            });
        }
        if let Some(record) = self
            .changed_parts
            .iter()
            .find(|r| r.action.len() > max_action_len)
        {
            return Err(ProtocolError::ActionTooLong {
                len: record.action.len(),
                max: max_action_len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfsync_model::Chapter;

    #[test]
    fn decodes_client_batch() {
        let json = r#"{"changedParts":[
            {"action":"UPDATE_CHAPTER","isarId":5,
             "data":"{\"id\":5,\"mangaId\":1}","clientDate":100},
            {"action":"CLEAR_HISTORY","clientDate":101}
        ]}"#;
        let req: SyncRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.changed_parts.len(), 2);
        assert_eq!(req.changed_parts[0].isar_id, Some(5));
        assert_eq!(req.changed_parts[1].isar_id, None);
        assert_eq!(req.changed_parts[1].data, "");
        assert_eq!(
            req.changed_parts[1].action_type(),
            Some(ActionType::ClearHistory)
        );
    }

    #[test]
    fn payload_decodes_entity() {
        let chapter = Chapter {
            id: 5,
            manga_id: 1,
            name: "Ch. 5".into(),
            ..Default::default()
        };
        let record =
            ChangeRecord::with_entity(ActionType::UpdateChapter, Some(5), &chapter, 10).unwrap();
        let back: Chapter = record.payload(ActionType::UpdateChapter).unwrap();
        assert_eq!(back, chapter);
    }

    #[test]
    fn malformed_payload_is_reported() {
        let record = ChangeRecord::new(ActionType::AddChapter, None, "{\"id\":1}", 10);
        let err = record.payload::<Chapter>(ActionType::AddChapter).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedPayload { .. }));
    }

    #[test]
    fn missing_target_id() {
        let record = ChangeRecord::new(ActionType::RemoveTrack, None, "", 1);
        assert!(matches!(
            record.target_id(ActionType::RemoveTrack),
            Err(ProtocolError::MissingIsarId(ActionType::RemoveTrack))
        ));

        let record = ChangeRecord::new(ActionType::UpdateTrack, Some(8), "{}", 1);
        assert_eq!(record.target_id(ActionType::UpdateTrack).unwrap(), 8);
    }

    #[test]
    fn validate_rejects_bad_batches() {
        let empty = SyncRequest::new(vec![]);
        assert!(matches!(empty.validate(10, 128), Err(ProtocolError::EmptyBatch)));

        let many = SyncRequest::new(vec![
            ChangeRecord::new(ActionType::ClearHistory, None, "", 1);
            3
        ]);
        assert!(matches!(
            many.validate(2, 128),
            Err(ProtocolError::BatchTooLarge { len: 3, max: 2 })
        ));
        assert!(many.validate(3, 128).is_ok());

        let long = SyncRequest::new(vec![ChangeRecord {
            action: "X".repeat(129),
            isar_id: None,
            data: String::new(),
            client_date: 0,
        }]);
        assert!(matches!(
            long.validate(10, DEFAULT_MAX_ACTION_LEN),
            Err(ProtocolError::ActionTooLong { len: 129, .. })
        ));
    }

    #[test]
    fn unknown_action_passes_validation() {
        let req = SyncRequest::new(vec![ChangeRecord {
            action: "SOMETHING_NEW".into(),
            isar_id: None,
            data: String::new(),
            client_date: 0,
        }]);
        assert!(req.validate(DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_ACTION_LEN).is_ok());
        assert_eq!(req.changed_parts[0].action_type(), None);
    }
}
