//! # Shelfsync Engine
//!
//! Reconciliation of backup documents.
//!
//! This crate provides:
//! - Bulk merge of a stored document with a client upload
//! - Incremental patch replay with last-writer-wins arbitration
//! - Kotatsu backup import
//!
//! ## Merge
//!
//! [`merge_backups`] combines the stored document with a client snapshot,
//! honouring the explicit deletion and chapter intents the client sends
//! alongside it. Deletion intents dominate: a deleted manga or category
//! never survives, whichever side still holds it.
//!
//! ## Patch
//!
//! [`PatchProcessor`] replays a batch of [`ChangeRecord`]s in `clientDate`
//! order. Update records consult a [`ChangeLog`] so that an older update
//! never overwrites a newer one, even when it arrives in a later batch.
//!
//! ## Key Invariants
//!
//! - Merge and patch never leave a child entity whose manga is gone
//! - Merging a document with itself changes nothing
//! - Documents with an unsupported version pass through untouched
//!
//! [`ChangeRecord`]: shelfsync_protocol::ChangeRecord
//! [`ChangeLog`]: shelfsync_storage::ChangeLog

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod import;
mod merge;
mod patch;

pub use config::{MergeOptions, PatchOptions};
pub use error::{EngineError, EngineResult};
pub use import::{
    import_kotatsu, KotatsuBackup, KotatsuCategory, KotatsuFavourite, KotatsuHistory,
    KotatsuManga, KotatsuTag,
};
pub use merge::{merge_backups, MergeOutcome, MergeSkip, MergeStats};
pub use patch::{PatchProcessor, PatchReport};
