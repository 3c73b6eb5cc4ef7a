//! The append-only change log ("timeline") used for staleness arbitration.

use crate::error::StorageResult;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a user owning one backup document.
pub type UserId = Uuid;

/// One accepted update, as recorded in the change log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    /// Row id.
    pub id: Uuid,
    /// Owning user.
    pub user: UserId,
    /// Action wire name.
    pub action_type: String,
    /// Target entity id.
    #[serde(default)]
    pub isar_id: Option<i64>,
    /// Payload at the time of acceptance.
    pub backup_data: String,
    /// Client timestamp of the update.
    pub client_date: i64,
}

impl TimelineEntry {
    /// Creates an entry with a fresh row id.
    pub fn new(
        user: UserId,
        action_type: impl Into<String>,
        isar_id: Option<i64>,
        backup_data: impl Into<String>,
        client_date: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            action_type: action_type.into(),
            isar_id,
            backup_data: backup_data.into(),
            client_date,
        }
    }

    /// Returns true if the entry records `action_type` on `isar_id`.
    pub fn matches(&self, action_type: &str, isar_id: Option<i64>) -> bool {
        self.action_type == action_type && self.isar_id == isar_id
    }
}

/// Returns the most recent entry for `(action_type, isar_id)`.
///
/// Entries are ordered by `client_date`; among equal dates the one appended
/// last wins.
pub fn latest_matching<'a, I>(
    entries: I,
    action_type: &str,
    isar_id: Option<i64>,
) -> Option<&'a TimelineEntry>
where
    I: IntoIterator<Item = &'a TimelineEntry>,
{
    entries
        .into_iter()
        .filter(|e| e.matches(action_type, isar_id))
        .fold(None, |best: Option<&TimelineEntry>, e| match best {
            Some(b) if b.client_date > e.client_date => Some(b),
            _ => Some(e),
        })
}

/// Per-user view of the change log used by the patch processor.
pub trait ChangeLog {
    /// Returns the most recent entry for `(action_type, isar_id)`.
    fn latest(
        &self,
        action_type: &str,
        isar_id: Option<i64>,
    ) -> StorageResult<Option<TimelineEntry>>;

    /// Appends an entry for an accepted update.
    fn record(
        &mut self,
        action_type: &str,
        isar_id: Option<i64>,
        backup_data: &str,
        client_date: i64,
    ) -> StorageResult<()>;
}

/// A change log held entirely in memory.
///
/// Used for offline patching and tests; nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryChangeLog {
    user: UserId,
    entries: Vec<TimelineEntry>,
}

impl MemoryChangeLog {
    /// Creates an empty log for `user`.
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            entries: Vec::new(),
        }
    }

    /// Creates a log seeded with existing entries.
    pub fn with_entries(user: UserId, entries: Vec<TimelineEntry>) -> Self {
        Self { user, entries }
    }

    /// Returns the recorded entries in append order.
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Consumes the log, returning its entries.
    pub fn into_entries(self) -> Vec<TimelineEntry> {
        self.entries
    }
}

impl ChangeLog for MemoryChangeLog {
    fn latest(
        &self,
        action_type: &str,
        isar_id: Option<i64>,
    ) -> StorageResult<Option<TimelineEntry>> {
        Ok(latest_matching(&self.entries, action_type, isar_id).cloned())
    }

    fn record(
        &mut self,
        action_type: &str,
        isar_id: Option<i64>,
        backup_data: &str,
        client_date: i64,
    ) -> StorageResult<()> {
        self.entries.push(TimelineEntry::new(
            self.user,
            action_type,
            isar_id,
            backup_data,
            client_date,
        ));
        Ok(())
    }
}
