//! Per-user transactions over a storage backend.

use crate::backend::{CommitBatch, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::memory::InMemoryBackend;
use crate::timeline::{latest_matching, ChangeLog, TimelineEntry, UserId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Transactional access to per-user documents and change logs.
///
/// A transaction holds the user's lock from the first read to the commit,
/// so two concurrent transactions for the same user serialize. Different
/// users never contend.
///
/// # Example
///
/// ```rust
/// use shelfsync_storage::{BackupStore, StorageError};
/// use uuid::Uuid;
///
/// let store = BackupStore::in_memory();
/// let user = Uuid::new_v4();
/// store
///     .transaction(user, |txn| {
///         txn.set_document("{\"version\":\"1\"}");
///         Ok::<_, StorageError>(())
///     })
///     .unwrap();
/// assert!(store.read_document(user).unwrap().is_some());
/// ```
pub struct BackupStore {
    backend: Arc<dyn StorageBackend>,
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl std::fmt::Debug for BackupStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupStore")
            .field("users_locked", &self.locks.lock().len())
            .finish_non_exhaustive()
    }
}

impl BackupStore {
    /// Creates a store over a backend.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a store over a fresh [`InMemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()))
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Runs `f` holding the lock of `user`.
    ///
    /// The lock entry is dropped from the map once no other caller holds or
    /// waits on it, so the map only tracks users with work in flight.
    fn with_user_lock<R>(&self, user: UserId, f: impl FnOnce() -> R) -> R {
        let lock = Arc::clone(self.locks.lock().entry(user).or_default());
        let result = {
            let _guard = lock.lock();
            f()
        };
        let mut locks = self.locks.lock();
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&user);
        }
        result
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.locks.lock().len()
    }

    /// Returns the committed document text of `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn read_document(&self, user: UserId) -> StorageResult<Option<String>> {
        self.backend.read_document(user)
    }

    /// Returns the committed change log of `user`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    pub fn timeline(&self, user: UserId) -> StorageResult<Vec<TimelineEntry>> {
        self.backend.timeline(user)
    }

    /// Removes change log entries of `user` older than `before`.
    ///
    /// # Errors
    ///
    /// Returns an error if the change log cannot be rewritten.
    pub fn prune_timeline(&self, user: UserId, before: i64) -> StorageResult<usize> {
        self.with_user_lock(user, || self.backend.prune_timeline(user, before))
    }

    /// Runs `f` inside a transaction for `user`.
    ///
    /// Writes made through the transaction are committed atomically when
    /// `f` returns `Ok`. If `f` returns `Err`, nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or a storage error converted into `E` if
    /// loading or committing fails.
    pub fn transaction<F, T, E>(&self, user: UserId, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut UserTransaction<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        self.with_user_lock(user, || -> Result<T, E> {
            let document = self.backend.read_document(user)?;
            let mut txn = UserTransaction {
                user,
                backend: self.backend.as_ref(),
                document,
                dirty: false,
                staged: Vec::new(),
            };

            match f(&mut txn) {
                Ok(value) => {
                    let batch = txn.into_batch();
                    let rows = batch.timeline.len();
                    let wrote_document = batch.document.is_some();
                    self.backend.commit(user, batch)?;
                    debug!(%user, rows, wrote_document, "transaction committed");
                    Ok(value)
                }
                Err(err) => {
                    debug!(%user, staged = txn.staged.len(), "transaction rolled back");
                    Err(err)
                }
            }
        })
    }
}

/// The staged state of one user's transaction.
///
/// Lookups through [`ChangeLog`] see both committed rows and rows staged
/// earlier in the same transaction.
pub struct UserTransaction<'a> {
    user: UserId,
    backend: &'a dyn StorageBackend,
    document: Option<String>,
    dirty: bool,
    staged: Vec<TimelineEntry>,
}

impl UserTransaction<'_> {
    /// Returns the user this transaction belongs to.
    pub fn user(&self) -> UserId {
        self.user
    }

    /// Returns the document text as seen by this transaction.
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// Replaces the document text.
    pub fn set_document(&mut self, text: impl Into<String>) {
        self.document = Some(text.into());
        self.dirty = true;
    }

    /// Returns the change log rows staged so far.
    pub fn staged(&self) -> &[TimelineEntry] {
        &self.staged
    }

    fn into_batch(self) -> CommitBatch {
        CommitBatch {
            document: if self.dirty { self.document } else { None },
            timeline: self.staged,
        }
    }
}

impl ChangeLog for UserTransaction<'_> {
    fn latest(
        &self,
        action_type: &str,
        isar_id: Option<i64>,
    ) -> StorageResult<Option<TimelineEntry>> {
        let committed = self.backend.latest_entry(self.user, action_type, isar_id)?;
        let staged = latest_matching(&self.staged, action_type, isar_id);
        Ok(match (committed, staged) {
            (Some(c), Some(s)) if c.client_date > s.client_date => Some(c),
            (_, Some(s)) => Some(s.clone()),
            (c, None) => c,
        })
    }

    fn record(
        &mut self,
        action_type: &str,
        isar_id: Option<i64>,
        backup_data: &str,
        client_date: i64,
    ) -> StorageResult<()> {
        self.staged.push(TimelineEntry::new(
            self.user,
            action_type,
            isar_id,
            backup_data,
            client_date,
        ));
        Ok(())
    }
}
