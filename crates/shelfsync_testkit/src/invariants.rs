//! Invariant checkers for reconciled documents.

use shelfsync_model::{BackupDocument, Entity, EntityId, Fingerprint};
use shelfsync_protocol::ChangedItems;
use std::collections::HashSet;
use std::fmt;

/// A broken document invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A child entity references a manga that is not in the document.
    Orphan {
        /// Collection name.
        collection: &'static str,
        /// Child id.
        id: EntityId,
        /// Missing manga id.
        manga_id: EntityId,
    },
    /// Two entities of one collection share an id.
    DuplicateId {
        /// Collection name.
        collection: &'static str,
        /// Repeated id.
        id: EntityId,
    },
    /// A manga named by a deletion intent survived.
    DeletedMangaPresent(EntityId),
    /// A category named by a deletion intent survived.
    DeletedCategoryPresent(EntityId),
    /// Two documents expected to be equal have different fingerprints.
    FingerprintMismatch {
        /// Expected fingerprint.
        expected: String,
        /// Actual fingerprint.
        actual: String,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Orphan {
                collection,
                id,
                manga_id,
            } => write!(f, "{collection} #{id} references missing manga {manga_id}"),
            Self::DuplicateId { collection, id } => write!(f, "{collection} id {id} is repeated"),
            Self::DeletedMangaPresent(id) => write!(f, "deleted manga {id} is still present"),
            Self::DeletedCategoryPresent(id) => write!(f, "deleted category {id} is still present"),
            Self::FingerprintMismatch { expected, actual } => {
                write!(f, "fingerprint {actual} != expected {expected}")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// Result of an invariant check.
pub type InvariantResult = Result<(), InvariantViolation>;

/// Checks that every child's manga exists.
pub fn check_orphan_free(doc: &BackupDocument) -> InvariantResult {
    match doc.orphans().first() {
        Some(orphan) => Err(InvariantViolation::Orphan {
            collection: orphan.collection.as_str(),
            id: orphan.id,
            manga_id: orphan.manga_id,
        }),
        None => Ok(()),
    }
}

fn check_unique<T: Entity>(collection: &'static str, items: &[T]) -> InvariantResult {
    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(item.id()) {
            return Err(InvariantViolation::DuplicateId {
                collection,
                id: item.id(),
            });
        }
    }
    Ok(())
}

/// Checks that ids are unique within each collection.
pub fn check_unique_ids(doc: &BackupDocument) -> InvariantResult {
    check_unique("manga", &doc.manga)?;
    check_unique("categories", &doc.categories)?;
    check_unique("chapters", &doc.chapters)?;
    check_unique("history", &doc.history)?;
    check_unique("updates", &doc.updates)?;
    check_unique("tracks", &doc.tracks)?;
    check_unique("extensions", &doc.extensions)
}

/// Checks the structural invariants every stored document must hold.
pub fn check_invariants(doc: &BackupDocument) -> InvariantResult {
    check_orphan_free(doc)?;
    check_unique_ids(doc)
}

/// Checks that no manga or category named by a deletion intent survived.
pub fn check_deletions_applied(doc: &BackupDocument, changes: &ChangedItems) -> InvariantResult {
    if let Some(id) = changes
        .deleted_manga_ids()
        .into_iter()
        .find(|id| doc.manga_by_id(*id).is_some())
    {
        return Err(InvariantViolation::DeletedMangaPresent(id));
    }
    if let Some(id) = changes
        .deleted_category_ids()
        .into_iter()
        .find(|id| doc.category_by_id(*id).is_some())
    {
        return Err(InvariantViolation::DeletedCategoryPresent(id));
    }
    Ok(())
}

/// Checks that two documents fingerprint identically.
pub fn check_same_fingerprint(
    expected: &BackupDocument,
    actual: &BackupDocument,
) -> InvariantResult {
    let expected = Fingerprint::of(expected).map(|f| f.to_hex()).unwrap_or_default();
    let actual = Fingerprint::of(actual).map(|f| f.to_hex()).unwrap_or_default();
    if expected == actual {
        Ok(())
    } else {
        Err(InvariantViolation::FingerprintMismatch { expected, actual })
    }
}
