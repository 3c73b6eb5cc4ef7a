//! # ShelfSync Storage
//!
//! Persistence for per-user backup documents and their change logs.
//!
//! Backends store the document as an **opaque text blob** and the change log
//! as append-only rows. They do not interpret either.
//!
//! ## Design Principles
//!
//! - One document and one change log per user, no cross-user state
//! - Commits are atomic: document replacement and log appends land together
//! - Must be `Send + Sync` for concurrent access
//! - [`BackupStore`] serializes transactions per user
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//! - [`FileBackend`] - For persistent storage in a data directory
//!
//! ## Example
//!
//! ```rust
//! use shelfsync_storage::{BackupStore, ChangeLog, StorageError};
//! use uuid::Uuid;
//!
//! let store = BackupStore::in_memory();
//! let user = Uuid::new_v4();
//! store
//!     .transaction(user, |txn| {
//!         txn.record("UPDATE_ITEM", Some(1), "{}", 1_700_000_000_000)?;
//!         Ok::<_, StorageError>(())
//!     })
//!     .unwrap();
//! assert_eq!(store.timeline(user).unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod store;
mod timeline;

pub use backend::{CommitBatch, StorageBackend};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use store::{BackupStore, UserTransaction};
pub use timeline::{latest_matching, ChangeLog, MemoryChangeLog, TimelineEntry, UserId};
