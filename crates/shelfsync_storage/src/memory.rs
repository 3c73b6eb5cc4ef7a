//! In-memory storage backend for testing.

use crate::backend::{CommitBatch, StorageBackend};
use crate::error::StorageResult;
use crate::timeline::{latest_matching, TimelineEntry, UserId};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
struct UserRecord {
    document: Option<String>,
    timeline: Vec<TimelineEntry>,
}

/// An in-memory storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral servers that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use shelfsync_storage::{CommitBatch, InMemoryBackend, StorageBackend};
/// use uuid::Uuid;
///
/// let backend = InMemoryBackend::new();
/// let user = Uuid::new_v4();
/// backend
///     .commit(user, CommitBatch { document: Some("{}".into()), timeline: vec![] })
///     .unwrap();
/// assert_eq!(backend.read_document(user).unwrap().as_deref(), Some("{}"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    users: RwLock<HashMap<UserId, UserRecord>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of users with stored state.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.users.read().len()
    }

    /// Clears all data from the backend.
    pub fn clear(&self) {
        self.users.write().clear();
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_document(&self, user: UserId) -> StorageResult<Option<String>> {
        Ok(self
            .users
            .read()
            .get(&user)
            .and_then(|record| record.document.clone()))
    }

    fn commit(&self, user: UserId, batch: CommitBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut users = self.users.write();
        let record = users.entry(user).or_default();
        if let Some(document) = batch.document {
            record.document = Some(document);
        }
        record.timeline.extend(batch.timeline);
        Ok(())
    }

    fn latest_entry(
        &self,
        user: UserId,
        action_type: &str,
        isar_id: Option<i64>,
    ) -> StorageResult<Option<TimelineEntry>> {
        let users = self.users.read();
        Ok(users
            .get(&user)
            .and_then(|record| latest_matching(&record.timeline, action_type, isar_id))
            .cloned())
    }

    fn timeline(&self, user: UserId) -> StorageResult<Vec<TimelineEntry>> {
        Ok(self
            .users
            .read()
            .get(&user)
            .map(|record| record.timeline.clone())
            .unwrap_or_default())
    }

    fn prune_timeline(&self, user: UserId, before: i64) -> StorageResult<usize> {
        let mut users = self.users.write();
        let Some(record) = users.get_mut(&user) else {
            return Ok(0);
        };
        let len = record.timeline.len();
        record.timeline.retain(|e| e.client_date >= before);
        Ok(len - record.timeline.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn entry(user: UserId, isar_id: i64, client_date: i64) -> TimelineEntry {
        TimelineEntry::new(user, "UPDATE_ITEM", Some(isar_id), "{}", client_date)
    }

    #[test]
    fn memory_empty_user() {
        let backend = InMemoryBackend::new();
        let user = Uuid::new_v4();
        assert!(backend.read_document(user).unwrap().is_none());
        assert!(backend.timeline(user).unwrap().is_empty());
        assert_eq!(backend.prune_timeline(user, 10).unwrap(), 0);
    }

    #[test]
    fn memory_commit_document_and_timeline() {
        let backend = InMemoryBackend::new();
        let user = Uuid::new_v4();

        backend
            .commit(
                user,
                CommitBatch {
                    document: Some("v1".into()),
                    timeline: vec![entry(user, 1, 100)],
                },
            )
            .unwrap();
        backend
            .commit(
                user,
                CommitBatch {
                    document: None,
                    timeline: vec![entry(user, 1, 50)],
                },
            )
            .unwrap();

        assert_eq!(backend.read_document(user).unwrap().as_deref(), Some("v1"));
        assert_eq!(backend.timeline(user).unwrap().len(), 2);
        let latest = backend
            .latest_entry(user, "UPDATE_ITEM", Some(1))
            .unwrap()
            .unwrap();
        assert_eq!(latest.client_date, 100);
    }

    #[test]
    fn memory_users_are_isolated() {
        let backend = InMemoryBackend::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        backend
            .commit(
                alice,
                CommitBatch {
                    document: Some("a".into()),
                    timeline: vec![entry(alice, 1, 1)],
                },
            )
            .unwrap();

        assert!(backend.read_document(bob).unwrap().is_none());
        assert!(backend
            .latest_entry(bob, "UPDATE_ITEM", Some(1))
            .unwrap()
            .is_none());
        assert_eq!(backend.user_count(), 1);
    }

    #[test]
    fn memory_prune() {
        let backend = InMemoryBackend::new();
        let user = Uuid::new_v4();
        backend
            .commit(
                user,
                CommitBatch {
                    document: None,
                    timeline: vec![entry(user, 1, 10), entry(user, 2, 20), entry(user, 3, 30)],
                },
            )
            .unwrap();

        assert_eq!(backend.prune_timeline(user, 20).unwrap(), 1);
        let left: Vec<_> = backend
            .timeline(user)
            .unwrap()
            .iter()
            .map(|e| e.client_date)
            .collect();
        assert_eq!(left, vec![20, 30]);
    }

    #[test]
    fn memory_empty_commit_creates_nothing() {
        let backend = InMemoryBackend::new();
        backend
            .commit(Uuid::new_v4(), CommitBatch::default())
            .unwrap();
        assert_eq!(backend.user_count(), 0);
    }
}
