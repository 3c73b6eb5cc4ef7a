//! File-based storage backend for persistent storage.
//!
//! Layout of the data directory:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK                     # Advisory lock for single-process ownership
//! ├─ <user>.doc.json          # Document text + committed timeline length
//! └─ <user>.timeline.jsonl    # Change log, one JSON entry per line
//! ```
//!
//! The document record is the commit point. Timeline bytes beyond the length
//! it records belong to an interrupted commit and are ignored on read and
//! truncated by the next commit.

use crate::backend::{CommitBatch, StorageBackend};
use crate::error::{StorageError, StorageResult};
use crate::timeline::{latest_matching, TimelineEntry, UserId};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

const LOCK_FILE: &str = "LOCK";
const DOC_SUFFIX: &str = ".doc.json";
const TIMELINE_SUFFIX: &str = ".timeline.jsonl";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredDocument {
    backup_data: Option<String>,
    timeline_len: u64,
}

/// A directory-based storage backend.
///
/// Data survives process restarts. Only one process may open a data
/// directory at a time.
///
/// # Durability
///
/// - Timeline rows are appended and synced before the document record
/// - The document record is replaced with write-then-rename
///
/// # Example
///
/// ```no_run
/// use shelfsync_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("shelfsync-data")).unwrap();
/// let user = uuid::Uuid::new_v4();
/// assert!(backend.read_document(user).unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    _lock_file: File,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Opens or creates a data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists and is not a directory
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> StorageResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(StorageError::InvalidDirectory(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the data directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists users with a stored document record.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn users(&self) -> StorageResult<Vec<UserId>> {
        let mut users = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let name = entry?.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(DOC_SUFFIX)) else {
                continue;
            };
            if let Ok(user) = Uuid::parse_str(stem) {
                users.push(user);
            }
        }
        users.sort();
        Ok(users)
    }

    fn document_path(&self, user: UserId) -> PathBuf {
        self.path.join(format!("{user}{DOC_SUFFIX}"))
    }

    fn timeline_path(&self, user: UserId) -> PathBuf {
        self.path.join(format!("{user}{TIMELINE_SUFFIX}"))
    }

    fn read_stored(&self, user: UserId) -> StorageResult<Option<StoredDocument>> {
        let text = match fs::read_to_string(self.document_path(user)) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&text).map(Some).map_err(|e| {
            StorageError::corrupted(format!("document record of {user}: {e}"))
        })
    }

    fn write_stored(&self, user: UserId, stored: &StoredDocument) -> StorageResult<()> {
        let path = self.document_path(user);
        let temp = self.path.join(format!("{user}{DOC_SUFFIX}{TEMP_SUFFIX}"));
        let data = serde_json::to_vec(stored)?;
        write_synced(&temp, &data)?;
        fs::rename(&temp, &path)?;
        self.sync_directory()
    }

    fn read_timeline(&self, user: UserId, committed_len: u64) -> StorageResult<Vec<TimelineEntry>> {
        let mut file = match File::open(self.timeline_path(user)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut data = Vec::new();
        std::io::Read::by_ref(&mut file).take(committed_len).read_to_end(&mut data)?;

        let mut entries = Vec::new();
        for (index, line) in data.split(|b| *b == b'\n').enumerate() {
            if line.is_empty() {
                continue;
            }
            let entry: TimelineEntry = serde_json::from_slice(line).map_err(|e| {
                StorageError::corrupted(format!("timeline of {user}, line {}: {e}", index + 1))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn committed(&self, user: UserId) -> StorageResult<(StoredDocument, Vec<TimelineEntry>)> {
        let stored = self.read_stored(user)?.unwrap_or_default();
        let timeline = self.read_timeline(user, stored.timeline_len)?;
        Ok((stored, timeline))
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        Ok(())
    }
}

fn write_synced(path: &Path, data: &[u8]) -> StorageResult<()> {
    let mut file = File::create(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

fn encode_lines(entries: &[TimelineEntry]) -> StorageResult<Vec<u8>> {
    let mut buf = Vec::new();
    for entry in entries {
        serde_json::to_writer(&mut buf, entry)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

impl StorageBackend for FileBackend {
    fn read_document(&self, user: UserId) -> StorageResult<Option<String>> {
        Ok(self.read_stored(user)?.and_then(|s| s.backup_data))
    }

    fn commit(&self, user: UserId, batch: CommitBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        let current = self.read_stored(user)?.unwrap_or_default();
        let mut timeline_len = current.timeline_len;

        if !batch.timeline.is_empty() {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(self.timeline_path(user))?;
            let actual = file.metadata()?.len();
            timeline_len = timeline_len.min(actual);
            if actual > timeline_len {
                debug!(
                    %user,
                    dropped = actual - timeline_len,
                    "discarding uncommitted timeline tail"
                );
            }
            file.set_len(timeline_len)?;
            file.seek(SeekFrom::End(0))?;

            let data = encode_lines(&batch.timeline)?;
            file.write_all(&data)?;
            file.sync_all()?;
            timeline_len += data.len() as u64;
        }

        let stored = StoredDocument {
            backup_data: batch.document.or(current.backup_data),
            timeline_len,
        };
        self.write_stored(user, &stored)?;
        debug!(%user, rows = batch.timeline.len(), "commit durable");
        Ok(())
    }

    fn latest_entry(
        &self,
        user: UserId,
        action_type: &str,
        isar_id: Option<i64>,
    ) -> StorageResult<Option<TimelineEntry>> {
        let (_, timeline) = self.committed(user)?;
        Ok(latest_matching(&timeline, action_type, isar_id).cloned())
    }

    fn timeline(&self, user: UserId) -> StorageResult<Vec<TimelineEntry>> {
        Ok(self.committed(user)?.1)
    }

    fn prune_timeline(&self, user: UserId, before: i64) -> StorageResult<usize> {
        let _guard = self.write_lock.lock();
        let (stored, timeline) = self.committed(user)?;
        let total = timeline.len();
        let kept: Vec<_> = timeline
            .into_iter()
            .filter(|e| e.client_date >= before)
            .collect();
        let removed = total - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let data = encode_lines(&kept)?;
        let temp = self.path.join(format!("{user}{TIMELINE_SUFFIX}{TEMP_SUFFIX}"));
        write_synced(&temp, &data)?;
        fs::rename(&temp, self.timeline_path(user))?;
        self.write_stored(
            user,
            &StoredDocument {
                backup_data: stored.backup_data,
                timeline_len: data.len() as u64,
            },
        )?;
        debug!(%user, removed, "timeline pruned");
        Ok(removed)
    }
}
