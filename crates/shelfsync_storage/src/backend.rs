//! Storage backend trait definition.

use crate::error::StorageResult;
use crate::timeline::{TimelineEntry, UserId};

/// Writes staged by one transaction, applied atomically by [`StorageBackend::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitBatch {
    /// Replacement document text, if the transaction changed it.
    pub document: Option<String>,
    /// Change log rows to append.
    pub timeline: Vec<TimelineEntry>,
}

impl CommitBatch {
    /// Returns true if the batch writes nothing.
    pub fn is_empty(&self) -> bool {
        self.document.is_none() && self.timeline.is_empty()
    }
}

/// Persistence for per-user backup documents and change logs.
///
/// Backends treat the document as an **opaque text blob**; they never parse
/// it. The change log is append-only except for explicit retention pruning.
///
/// # Invariants
///
/// - `commit` is atomic: after a crash either the whole batch is visible or
///   none of it is
/// - `latest_entry` orders by `client_date`, ties going to the row appended last
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Returns the stored document text of `user`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored record cannot be read.
    fn read_document(&self, user: UserId) -> StorageResult<Option<String>>;

    /// Applies a batch of writes for `user` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be made durable; in that case
    /// none of it is visible.
    fn commit(&self, user: UserId, batch: CommitBatch) -> StorageResult<()>;

    /// Returns the most recent change log entry for `(action_type, isar_id)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the change log cannot be read.
    fn latest_entry(
        &self,
        user: UserId,
        action_type: &str,
        isar_id: Option<i64>,
    ) -> StorageResult<Option<TimelineEntry>>;

    /// Returns the full change log of `user` in append order.
    ///
    /// # Errors
    ///
    /// Returns an error if the change log cannot be read.
    fn timeline(&self, user: UserId) -> StorageResult<Vec<TimelineEntry>>;

    /// Removes change log entries with `client_date < before`.
    ///
    /// Returns the number of removed entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the change log cannot be rewritten.
    fn prune_timeline(&self, user: UserId, before: i64) -> StorageResult<usize>;
}
