//! Bulk merge of a client-submitted full document into the canonical one.
//!
//! Each collection has its own rule. The common thread is that explicit
//! intents in [`ChangedItems`] are authoritative: deletions always win over
//! timestamps, and chapters are only overwritten when an intent names them.
//! The merged document is orphan-free.

use crate::config::MergeOptions;
use shelfsync_model::{
    BackupDocument, Category, Chapter, Entity, EntityId, FeedUpdate, History, Manga, Track,
};
use shelfsync_protocol::{ChangedItems, UpdatedChapter};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Why a merge left the canonical document unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeSkip {
    /// The two documents carry different version tags.
    VersionMismatch {
        /// Canonical document version.
        old: String,
        /// Submitted document version.
        new: String,
    },
    /// The version has no merge rules.
    UnsupportedVersion(String),
}

/// Counters describing what a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Manga replaced by a newer client copy.
    pub manga_replaced: usize,
    /// Manga only present on the client.
    pub manga_added: usize,
    /// Manga removed by a deletion intent.
    pub manga_deleted: usize,
    /// Categories removed by a deletion intent.
    pub categories_deleted: usize,
    /// Chapters overwritten by an update intent.
    pub chapters_updated: usize,
    /// Chapters only present on the client.
    pub chapters_added: usize,
    /// Chapters removed by a deletion intent.
    pub chapters_deleted: usize,
    /// Children dropped by the final orphan pass.
    pub orphans_pruned: usize,
}

/// Result of [`merge_backups`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The merged document.
    pub document: BackupDocument,
    /// Set when the canonical document was returned unchanged.
    pub skipped: Option<MergeSkip>,
    /// What the merge did.
    pub stats: MergeStats,
}

impl MergeOutcome {
    /// Returns true if the merge rules ran.
    pub fn is_merged(&self) -> bool {
        self.skipped.is_none()
    }
}

fn by_id<T: Entity>(items: &[T]) -> HashMap<EntityId, &T> {
    items.iter().map(|item| (item.id(), item)).collect()
}

fn ids<T: Entity>(items: &[T]) -> HashSet<EntityId> {
    items.iter().map(Entity::id).collect()
}

/// Merges `new` (the client's full document) into `old` (the canonical one).
///
/// Fails open: when the versions differ or are not accepted by `options`,
/// `old` is returned unchanged and [`MergeOutcome::skipped`] says why.
pub fn merge_backups(
    old: &BackupDocument,
    new: &BackupDocument,
    changes: &ChangedItems,
    options: &MergeOptions,
) -> MergeOutcome {
    let skip = if old.version != new.version {
        Some(MergeSkip::VersionMismatch {
            old: old.version.clone(),
            new: new.version.clone(),
        })
    } else if !options.accepts(&old.version) {
        Some(MergeSkip::UnsupportedVersion(old.version.clone()))
    } else {
        None
    };
    if let Some(skip) = skip {
        warn!(?skip, "merge skipped, keeping canonical document");
        return MergeOutcome {
            document: old.clone(),
            skipped: Some(skip),
            stats: MergeStats::default(),
        };
    }

    let mut stats = MergeStats::default();
    let deleted_manga = changes.deleted_manga_ids();
    let deleted_categories = changes.deleted_category_ids();

    let mut merged = old.clone();
    merged.manga = merge_manga(&old.manga, &new.manga, &deleted_manga, &mut stats);
    merged.categories = merge_categories(
        &old.categories,
        &new.categories,
        &deleted_categories,
        &mut stats,
    );
    strip_deleted_categories(&mut merged.manga, &deleted_categories);

    let live = merged.manga_ids();
    merged.chapters = merge_chapters(&old.chapters, &new.chapters, changes, &live, &mut stats);
    merged.tracks = merge_tracks(&old.tracks, &new.tracks);
    merged.history = merge_history(&old.history, &new.history, &live);
    merged.updates = merge_updates(old, new, changes, &live);

    stats.orphans_pruned = merged.prune_orphans().total();
    info!(
        manga = merged.manga.len(),
        chapters = merged.chapters.len(),
        deleted = stats.manga_deleted,
        orphans = stats.orphans_pruned,
        "merge complete"
    );

    MergeOutcome {
        document: merged,
        skipped: None,
        stats,
    }
}

/// Newer-wins per manga on `lastRead`/`lastUpdate`; deletion dominates.
fn merge_manga(
    old: &[Manga],
    new: &[Manga],
    deleted: &HashSet<EntityId>,
    stats: &mut MergeStats,
) -> Vec<Manga> {
    let incoming = by_id(new);
    let mut out = Vec::with_capacity(old.len().max(new.len()));
    let mut seen = HashSet::new();

    for manga in old {
        if deleted.contains(&manga.id) {
            stats.manga_deleted += 1;
            continue;
        }
        seen.insert(manga.id);
        match incoming.get(&manga.id) {
            Some(candidate) if manga.is_superseded_by(candidate) => {
                debug!(id = manga.id, "manga replaced by newer client copy");
                stats.manga_replaced += 1;
                out.push((*candidate).clone());
            }
            _ => out.push(manga.clone()),
        }
    }

    let known = ids(old);
    for manga in new {
        if known.contains(&manga.id) || deleted.contains(&manga.id) || !seen.insert(manga.id) {
            continue;
        }
        stats.manga_added += 1;
        out.push(manga.clone());
    }
    out
}

fn merge_categories(
    old: &[Category],
    new: &[Category],
    deleted: &HashSet<EntityId>,
    stats: &mut MergeStats,
) -> Vec<Category> {
    let incoming = by_id(new);
    let mut out = Vec::with_capacity(old.len().max(new.len()));
    let mut seen = HashSet::new();

    for category in old {
        if deleted.contains(&category.id) {
            stats.categories_deleted += 1;
            continue;
        }
        seen.insert(category.id);
        out.push(
            incoming
                .get(&category.id)
                .map_or_else(|| category.clone(), |c| (*c).clone()),
        );
    }

    for category in new {
        if deleted.contains(&category.id) || !seen.insert(category.id) {
            continue;
        }
        out.push(category.clone());
    }
    out
}

fn strip_deleted_categories(manga: &mut [Manga], deleted: &HashSet<EntityId>) {
    if deleted.is_empty() {
        return;
    }
    for entry in manga {
        if let Some(categories) = entry.categories.value_mut() {
            categories.retain(|id| !deleted.contains(id));
        }
    }
}

fn apply_intent(chapter: &mut Chapter, intent: &UpdatedChapter) {
    chapter.is_bookmarked.set(intent.is_bookmarked);
    chapter.is_read.set(intent.is_read);
    chapter.last_page_read.set(intent.last_page_read.clone());
}

/// Chapters change only under an explicit intent; new ones need a live manga.
fn merge_chapters(
    old: &[Chapter],
    new: &[Chapter],
    changes: &ChangedItems,
    live: &HashSet<EntityId>,
    stats: &mut MergeStats,
) -> Vec<Chapter> {
    let intents = changes.chapter_intents();
    let incoming = by_id(new);
    let mut out = Vec::with_capacity(old.len().max(new.len()));
    let mut seen = HashSet::new();

    for chapter in old {
        seen.insert(chapter.id);
        match intents.get(&chapter.id) {
            Some(intent) if intent.deleted => stats.chapters_deleted += 1,
            Some(intent) => {
                let mut updated = incoming
                    .get(&chapter.id)
                    .map_or_else(|| chapter.clone(), |c| (*c).clone());
                apply_intent(&mut updated, intent);
                stats.chapters_updated += 1;
                out.push(updated);
            }
            None => out.push(chapter.clone()),
        }
    }

    for chapter in new {
        if !seen.insert(chapter.id) {
            continue;
        }
        if intents.get(&chapter.id).is_some_and(|i| i.deleted) {
            continue;
        }
        if !live.contains(&chapter.manga_id) {
            debug!(
                id = chapter.id,
                manga_id = chapter.manga_id,
                "dropping chapter of missing manga"
            );
            continue;
        }
        stats.chapters_added += 1;
        out.push(chapter.clone());
    }
    out
}

/// Tracks are fully re-submitted: the client's set survives, and for shared
/// ids the copy with the greater progress is kept.
fn merge_tracks(old: &[Track], new: &[Track]) -> Vec<Track> {
    let existing = by_id(old);
    let mut seen = HashSet::new();
    new.iter()
        .filter(|track| seen.insert(track.id))
        .map(|track| match existing.get(&track.id) {
            Some(prev) if prev.progress() > track.progress() => (*prev).clone(),
            _ => track.clone(),
        })
        .collect()
}

/// One history row per manga; the later `date` wins.
fn merge_history(old: &[History], new: &[History], live: &HashSet<EntityId>) -> Vec<History> {
    let mut incoming: HashMap<EntityId, &History> = HashMap::new();
    for row in new {
        match incoming.get(&row.manga_id) {
            Some(prev) if prev.timestamp() >= row.timestamp() => {}
            _ => {
                incoming.insert(row.manga_id, row);
            }
        }
    }

    let mut out = Vec::with_capacity(old.len().max(new.len()));
    let mut covered = HashSet::new();
    for row in old {
        if !live.contains(&row.manga_id) {
            continue;
        }
        if !covered.insert(row.manga_id) {
            out.push(row.clone());
            continue;
        }
        match incoming.get(&row.manga_id) {
            Some(candidate) if candidate.timestamp() > row.timestamp() => {
                out.push((*candidate).clone())
            }
            _ => out.push(row.clone()),
        }
    }

    for row in new {
        if covered.contains(&row.manga_id) || !live.contains(&row.manga_id) {
            continue;
        }
        let is_latest = incoming
            .get(&row.manga_id)
            .is_some_and(|latest| std::ptr::eq(*latest, row));
        if is_latest {
            covered.insert(row.manga_id);
            out.push(row.clone());
        }
    }
    out
}

/// The client's copy of a feed item wins whenever present.
///
/// A chapter deletion intent clears the whole feed of its manga, since a
/// feed item only names its chapter by display name.
fn merge_updates(
    old: &BackupDocument,
    new: &BackupDocument,
    changes: &ChangedItems,
    live: &HashSet<EntityId>,
) -> Vec<FeedUpdate> {
    let cleared: HashSet<EntityId> = changes.deleted_chapters().map(|c| c.manga_id).collect();
    let incoming = by_id(&new.updates);
    let mut candidates = Vec::with_capacity(old.updates.len() + new.updates.len());
    let mut seen = HashSet::new();
    for feed in &old.updates {
        seen.insert(feed.id);
        candidates.push(incoming.get(&feed.id).copied().unwrap_or(feed));
    }
    for feed in &new.updates {
        if seen.insert(feed.id) {
            candidates.push(feed);
        }
    }

    let mut keys = HashSet::new();
    let mut out = Vec::with_capacity(candidates.len());
    for feed in candidates {
        if !live.contains(&feed.manga_id) || cleared.contains(&feed.manga_id) {
            continue;
        }
        if keys.insert(feed.dedup_key()) {
            out.push(feed.clone());
        }
    }
    if !cleared.is_empty() {
        debug!(manga = cleared.len(), "feeds cleared by chapter deletions");
    }
    out
}
