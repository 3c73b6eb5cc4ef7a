//! Content fingerprints for change detection.
//!
//! A fingerprint is the SHA-256 of a canonical view of the document that
//! contains only `version` and the mutable collections, with every storage
//! id zeroed. Two documents that differ only in id assignment hash equally.

use crate::document::BackupDocument;
use crate::entity::{Category, Chapter, Entity, Extension, FeedUpdate, History, Manga, Track};
use crate::error::ModelResult;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Canonical view hashed by [`Fingerprint::of`].
///
/// Field order here is the serialization order and therefore part of the
/// fingerprint format.
#[derive(Serialize)]
struct CanonicalView<'a> {
    version: &'a str,
    manga: Vec<Manga>,
    categories: Vec<Category>,
    chapters: Vec<Chapter>,
    tracks: Vec<Track>,
    history: Vec<History>,
    updates: Vec<FeedUpdate>,
    extensions: Vec<Extension>,
}

fn zeroed<T: Entity + Clone>(items: &[T]) -> Vec<T> {
    items
        .iter()
        .cloned()
        .map(|mut item| {
            item.set_id(0);
            item
        })
        .collect()
}

/// SHA-256 fingerprint of a canonicalized backup document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint of an absent document: the hash of zero bytes.
    pub fn empty() -> Self {
        Self(Sha256::digest(b"").into())
    }

    /// Computes the fingerprint of a document.
    pub fn of(document: &BackupDocument) -> ModelResult<Self> {
        let view = CanonicalView {
            version: &document.version,
            manga: zeroed(&document.manga),
            categories: zeroed(&document.categories),
            chapters: zeroed(&document.chapters),
            tracks: zeroed(&document.tracks),
            history: zeroed(&document.history),
            updates: zeroed(&document.updates),
            extensions: zeroed(&document.extensions),
        };
        let bytes = serde_json::to_vec(&view)?;
        Ok(Self(Sha256::digest(&bytes).into()))
    }

    /// Computes the fingerprint of a possibly absent document.
    pub fn of_optional(document: Option<&BackupDocument>) -> ModelResult<Self> {
        match document {
            Some(doc) => Self::of(doc),
            None => Ok(Self::empty()),
        }
    }

    /// Computes the fingerprint of stored document text.
    ///
    /// Missing or blank text hashes as an absent document.
    pub fn of_stored(text: Option<&str>) -> ModelResult<Self> {
        match text.map(str::trim) {
            None | Some("") => Ok(Self::empty()),
            Some(text) => Self::of(&BackupDocument::from_json(text)?),
        }
    }

    /// Returns the raw digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
