//! # ShelfSync Protocol
//!
//! Wire types for backup reconciliation.
//!
//! This crate provides:
//! - [`ActionType`], the closed set of incremental change actions
//! - [`ChangeRecord`] and [`SyncRequest`] with batch validation
//! - [`ChangedItems`], the explicit intents of a bulk merge
//! - Request/response messages and the [`ShelfMessage`] envelope
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod action;
mod change;
mod changed_items;
mod error;
mod messages;

pub use action::{ActionKind, ActionType};
pub use change::{ChangeRecord, SyncRequest, DEFAULT_MAX_ACTION_LEN, DEFAULT_MAX_BATCH_SIZE};
pub use changed_items::{ChangedItems, DeletedCategory, DeletedManga, UpdatedChapter};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    BackupPayload, BackupResponse, ErrorResponse, HashResponse, MergeRequest, ShelfMessage,
    ShelfReply, UploadRequest,
};
