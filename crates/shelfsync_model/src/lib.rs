//! # shelfsync Model
//!
//! Typed representation of the per-user backup document.
//!
//! This crate provides:
//! - [`BackupDocument`] and its entity collections
//! - Lookup helpers and referential-integrity enforcement ([`BackupDocument::prune_orphans`])
//! - [`Fingerprint`], the id-insensitive content hash clients use for change detection
//!
//! ## Referential Integrity
//!
//! Chapters, history rows, feed updates and tracks reference a manga through
//! `mangaId`. Storage does not enforce this; every mutation path (merge,
//! patch) finishes with [`BackupDocument::prune_orphans`] so the resulting
//! document never carries dangling references.
//!
//! This is a pure data crate with no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod document;
mod entity;
mod error;
mod field;
mod fingerprint;
mod number;

pub use document::{
    BackupDocument, Collection, DocumentStats, OrphanRef, PruneReport, SUPPORTED_VERSIONS,
};
pub use entity::{
    find_by_id, find_by_id_mut, remove_by_id, upsert, Category, Chapter, Entity, EntityId,
    Extension, FeedUpdate, History, Manga, MangaScoped, Track,
};
pub use error::{ModelError, ModelResult};
pub use field::Field;
pub use fingerprint::Fingerprint;
pub use number::LooseNumber;
