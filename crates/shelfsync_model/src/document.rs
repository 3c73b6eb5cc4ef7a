//! The canonical per-user backup document.

use crate::entity::{
    find_by_id, find_by_id_mut, Category, Chapter, Entity, EntityId, Extension, FeedUpdate,
    History, Manga, MangaScoped, Track,
};
use crate::error::ModelResult;
use crate::field::Field;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};

/// Document format versions that merge and patch logic understands.
pub const SUPPORTED_VERSIONS: &[&str] = &["1", "2"];

/// The server-held canonical copy of a user's library.
///
/// Collections the reconciliation logic never interprets (`settings`,
/// `downloads`, `trackPreferences`, `extensions_preferences`) are kept as raw
/// JSON values and carried through unchanged.
///
/// Parsing remembers which top-level keys were missing or `null` and whether
/// feed items arrived as `feeds`; serialization writes an untouched empty
/// collection back the same way.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupDocument {
    /// Format version tag.
    pub version: String,
    /// Library entries.
    pub manga: Vec<Manga>,
    /// Categories.
    pub categories: Vec<Category>,
    /// Chapters.
    pub chapters: Vec<Chapter>,
    /// Download tasks.
    pub downloads: Vec<Value>,
    /// Tracker links.
    pub tracks: Vec<Track>,
    /// Tracker account preferences.
    pub track_preferences: Vec<Value>,
    /// Reading history.
    pub history: Vec<History>,
    /// Feed items (older clients call this collection `feeds`).
    pub updates: Vec<FeedUpdate>,
    /// Client settings.
    pub settings: Vec<Value>,
    /// Installed extensions.
    pub extensions: Vec<Extension>,
    /// Per-extension preferences.
    pub extensions_preferences: Vec<Value>,
    /// Remaining top-level fields.
    pub extra: Map<String, Value>,
    layout: Layout,
}

/// How the top-level keys of a parsed document were written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Layout {
    missing: BTreeSet<&'static str>,
    null: BTreeSet<&'static str>,
    feeds_key: bool,
}

impl Layout {
    fn take<T>(&mut self, key: &'static str, field: Field<T>) -> T
    where
        T: Default,
    {
        match field {
            Field::Set(value) => value,
            Field::Null => {
                self.null.insert(key);
                T::default()
            }
            Field::Absent => {
                self.missing.insert(key);
                T::default()
            }
        }
    }

    fn shape<'a, T: ?Sized>(&self, key: &str, value: &'a T, empty: bool) -> Field<&'a T> {
        if empty && self.missing.contains(key) {
            Field::Absent
        } else if empty && self.null.contains(key) {
            Field::Null
        } else {
            Field::Set(value)
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDocument {
    #[serde(default)]
    version: Field<String>,
    #[serde(default)]
    manga: Field<Vec<Manga>>,
    #[serde(default)]
    categories: Field<Vec<Category>>,
    #[serde(default)]
    chapters: Field<Vec<Chapter>>,
    #[serde(default)]
    downloads: Field<Vec<Value>>,
    #[serde(default)]
    tracks: Field<Vec<Track>>,
    #[serde(default)]
    track_preferences: Field<Vec<Value>>,
    #[serde(default)]
    history: Field<Vec<History>>,
    #[serde(default)]
    updates: Field<Vec<FeedUpdate>>,
    #[serde(default)]
    feeds: Field<Vec<FeedUpdate>>,
    #[serde(default)]
    settings: Field<Vec<Value>>,
    #[serde(default)]
    extensions: Field<Vec<Extension>>,
    #[serde(default, rename = "extensions_preferences")]
    extensions_preferences: Field<Vec<Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl From<WireDocument> for BackupDocument {
    fn from(wire: WireDocument) -> Self {
        let mut layout = Layout::default();
        let mut extra = wire.extra;
        let updates = if wire.updates.is_absent() && !wire.feeds.is_absent() {
            layout.feeds_key = true;
            layout.take(FEEDS, wire.feeds)
        } else {
            if !wire.feeds.is_absent() {
                let feeds = serde_json::to_value(&wire.feeds).unwrap_or(Value::Null);
                extra.insert(FEEDS.to_string(), feeds);
            }
            layout.take(UPDATES, wire.updates)
        };
        Self {
            version: layout.take("version", wire.version),
            manga: layout.take("manga", wire.manga),
            categories: layout.take("categories", wire.categories),
            chapters: layout.take("chapters", wire.chapters),
            downloads: layout.take("downloads", wire.downloads),
            tracks: layout.take("tracks", wire.tracks),
            track_preferences: layout.take("trackPreferences", wire.track_preferences),
            history: layout.take("history", wire.history),
            updates,
            settings: layout.take("settings", wire.settings),
            extensions: layout.take("extensions", wire.extensions),
            extensions_preferences: layout
                .take("extensions_preferences", wire.extensions_preferences),
            extra,
            layout,
        }
    }
}

const UPDATES: &str = "updates";
const FEEDS: &str = "feeds";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRef<'a> {
    #[serde(skip_serializing_if = "Field::is_absent")]
    version: Field<&'a str>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    manga: Field<&'a [Manga]>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    categories: Field<&'a [Category]>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    chapters: Field<&'a [Chapter]>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    downloads: Field<&'a [Value]>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    tracks: Field<&'a [Track]>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    track_preferences: Field<&'a [Value]>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    history: Field<&'a [History]>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    updates: Field<&'a [FeedUpdate]>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    feeds: Field<&'a [FeedUpdate]>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    settings: Field<&'a [Value]>,
    #[serde(skip_serializing_if = "Field::is_absent")]
    extensions: Field<&'a [Extension]>,
    #[serde(skip_serializing_if = "Field::is_absent", rename = "extensions_preferences")]
    extensions_preferences: Field<&'a [Value]>,
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

impl Serialize for BackupDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let layout = &self.layout;
        let feed_key = if layout.feeds_key { FEEDS } else { UPDATES };
        let feeds = layout.shape(feed_key, self.updates.as_slice(), self.updates.is_empty());
        let (updates, feeds) = if layout.feeds_key {
            (Field::Absent, feeds)
        } else {
            (feeds, Field::Absent)
        };
        WireRef {
            version: layout.shape("version", self.version.as_str(), self.version.is_empty()),
            manga: layout.shape("manga", self.manga.as_slice(), self.manga.is_empty()),
            categories: layout.shape(
                "categories",
                self.categories.as_slice(),
                self.categories.is_empty(),
            ),
            chapters: layout.shape("chapters", self.chapters.as_slice(), self.chapters.is_empty()),
            downloads: layout.shape(
                "downloads",
                self.downloads.as_slice(),
                self.downloads.is_empty(),
            ),
            tracks: layout.shape("tracks", self.tracks.as_slice(), self.tracks.is_empty()),
            track_preferences: layout.shape(
                "trackPreferences",
                self.track_preferences.as_slice(),
                self.track_preferences.is_empty(),
            ),
            history: layout.shape("history", self.history.as_slice(), self.history.is_empty()),
            updates,
            feeds,
            settings: layout.shape("settings", self.settings.as_slice(), self.settings.is_empty()),
            extensions: layout.shape(
                "extensions",
                self.extensions.as_slice(),
                self.extensions.is_empty(),
            ),
            extensions_preferences: layout.shape(
                "extensions_preferences",
                self.extensions_preferences.as_slice(),
                self.extensions_preferences.is_empty(),
            ),
            extra: &self.extra,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BackupDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        WireDocument::deserialize(deserializer).map(Self::from)
    }
}

impl BackupDocument {
    /// Creates the empty document assigned to a user on first login.
    pub fn empty() -> Self {
        Self::with_version("1")
    }

    /// Creates an empty document with the given version tag.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            manga: Vec::new(),
            categories: Vec::new(),
            chapters: Vec::new(),
            downloads: Vec::new(),
            tracks: Vec::new(),
            track_preferences: Vec::new(),
            history: Vec::new(),
            updates: Vec::new(),
            settings: Vec::new(),
            extensions: Vec::new(),
            extensions_preferences: Vec::new(),
            extra: Map::new(),
            layout: Layout::default(),
        }
    }

    /// Parses a document from its stored text.
    pub fn from_json(text: &str) -> ModelResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes the document to its stored text.
    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Returns true if reconciliation logic is defined for this version.
    pub fn is_supported_version(&self) -> bool {
        SUPPORTED_VERSIONS.contains(&self.version.as_str())
    }

    /// Looks up a manga by id.
    pub fn manga_by_id(&self, id: EntityId) -> Option<&Manga> {
        find_by_id(&self.manga, id)
    }

    /// Looks up a manga by id for mutation.
    pub fn manga_by_id_mut(&mut self, id: EntityId) -> Option<&mut Manga> {
        find_by_id_mut(&mut self.manga, id)
    }

    /// Looks up a category by id.
    pub fn category_by_id(&self, id: EntityId) -> Option<&Category> {
        find_by_id(&self.categories, id)
    }

    /// Looks up a chapter by id.
    pub fn chapter_by_id(&self, id: EntityId) -> Option<&Chapter> {
        find_by_id(&self.chapters, id)
    }

    /// Looks up a history row by id.
    pub fn history_by_id(&self, id: EntityId) -> Option<&History> {
        find_by_id(&self.history, id)
    }

    /// Looks up a track by id.
    pub fn track_by_id(&self, id: EntityId) -> Option<&Track> {
        find_by_id(&self.tracks, id)
    }

    /// Looks up an extension by id.
    pub fn extension_by_id(&self, id: EntityId) -> Option<&Extension> {
        find_by_id(&self.extensions, id)
    }

    /// Returns the set of manga ids present in the document.
    pub fn manga_ids(&self) -> HashSet<EntityId> {
        self.manga.iter().map(Entity::id).collect()
    }

    /// Removes a manga together with everything that references it.
    ///
    /// Returns true if the manga was present.
    pub fn remove_manga_cascade(&mut self, manga_id: EntityId) -> bool {
        let before = self.manga.len();
        self.manga.retain(|m| m.id != manga_id);
        self.chapters.retain(|c| c.manga_id != manga_id);
        self.history.retain(|h| h.manga_id != manga_id);
        self.updates.retain(|u| u.manga_id != manga_id);
        self.tracks.retain(|t| t.manga_id != manga_id);
        self.manga.len() != before
    }

    /// Drops chapters, history, feed updates and tracks whose manga is gone.
    pub fn prune_orphans(&mut self) -> PruneReport {
        let live = self.manga_ids();
        PruneReport {
            chapters: retain_owned(&mut self.chapters, &live),
            history: retain_owned(&mut self.history, &live),
            updates: retain_owned(&mut self.updates, &live),
            tracks: retain_owned(&mut self.tracks, &live),
        }
    }

    /// Lists every child entity whose manga is missing, without mutating.
    pub fn orphans(&self) -> Vec<OrphanRef> {
        let live = self.manga_ids();
        let mut out = Vec::new();
        collect_orphans(&mut out, Collection::Chapters, &self.chapters, &live);
        collect_orphans(&mut out, Collection::History, &self.history, &live);
        collect_orphans(&mut out, Collection::Updates, &self.updates, &live);
        collect_orphans(&mut out, Collection::Tracks, &self.tracks, &live);
        out
    }

    /// Returns per-collection entity counts.
    pub fn stats(&self) -> DocumentStats {
        DocumentStats {
            version: self.version.clone(),
            manga: self.manga.len(),
            categories: self.categories.len(),
            chapters: self.chapters.len(),
            history: self.history.len(),
            updates: self.updates.len(),
            tracks: self.tracks.len(),
            extensions: self.extensions.len(),
            settings: self.settings.len(),
            downloads: self.downloads.len(),
        }
    }
}

impl Default for BackupDocument {
    fn default() -> Self {
        Self::empty()
    }
}

fn retain_owned<T: MangaScoped>(items: &mut Vec<T>, live: &HashSet<EntityId>) -> usize {
    let before = items.len();
    items.retain(|item| live.contains(&item.manga_id()));
    before - items.len()
}

fn collect_orphans<T: MangaScoped>(
    out: &mut Vec<OrphanRef>,
    collection: Collection,
    items: &[T],
    live: &HashSet<EntityId>,
) {
    out.extend(
        items
            .iter()
            .filter(|item| !live.contains(&item.manga_id()))
            .map(|item| OrphanRef {
                collection,
                id: item.id(),
                manga_id: item.manga_id(),
            }),
    );
}

/// The entity collections of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    /// `manga`
    Manga,
    /// `categories`
    Categories,
    /// `chapters`
    Chapters,
    /// `history`
    History,
    /// `updates`
    Updates,
    /// `tracks`
    Tracks,
    /// `extensions`
    Extensions,
}

impl Collection {
    /// Returns the collection's field name in the document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Manga => "manga",
            Collection::Categories => "categories",
            Collection::Chapters => "chapters",
            Collection::History => "history",
            Collection::Updates => "updates",
            Collection::Tracks => "tracks",
            Collection::Extensions => "extensions",
        }
    }
}

/// A child entity that references a missing manga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanRef {
    /// Collection holding the orphan.
    pub collection: Collection,
    /// Orphan's storage id.
    pub id: EntityId,
    /// The unresolved manga id.
    pub manga_id: EntityId,
}

/// Counts of entities dropped by [`BackupDocument::prune_orphans`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// Chapters dropped.
    pub chapters: usize,
    /// History rows dropped.
    pub history: usize,
    /// Feed updates dropped.
    pub updates: usize,
    /// Tracks dropped.
    pub tracks: usize,
}

impl PruneReport {
    /// Total number of dropped entities.
    pub fn total(&self) -> usize {
        self.chapters + self.history + self.updates + self.tracks
    }

    /// Returns true if nothing was dropped.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Per-collection entity counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    /// Format version.
    pub version: String,
    /// Manga count.
    pub manga: usize,
    /// Category count.
    pub categories: usize,
    /// Chapter count.
    pub chapters: usize,
    /// History row count.
    pub history: usize,
    /// Feed update count.
    pub updates: usize,
    /// Track count.
    pub tracks: usize,
    /// Extension count.
    pub extensions: usize,
    /// Settings entry count.
    pub settings: usize,
    /// Download task count.
    pub downloads: usize,
}
