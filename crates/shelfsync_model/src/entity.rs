//! Entities stored in a backup document.
//!
//! Every entity carries a typed core (the fields reconciliation reads) plus
//! an `extra` map holding all other client fields verbatim, so a document
//! survives a parse/serialize cycle without losing data the server does not
//! interpret.

use crate::field::Field;
use crate::number::LooseNumber;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Storage identity of a document entity (the client's Isar id).
pub type EntityId = i64;

/// An entity with a storage identity.
pub trait Entity {
    /// Returns the storage id.
    fn id(&self) -> EntityId;

    /// Overwrites the storage id.
    fn set_id(&mut self, id: EntityId);
}

/// An entity that references a manga through `mangaId`.
pub trait MangaScoped: Entity {
    /// Returns the referenced manga id.
    fn manga_id(&self) -> EntityId;
}

macro_rules! impl_entity {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Entity for $ty {
                fn id(&self) -> EntityId {
                    self.id
                }

                fn set_id(&mut self, id: EntityId) {
                    self.id = id;
                }
            }
        )*
    };
}

macro_rules! impl_manga_scoped {
    ($($ty:ty),* $(,)?) => {
        $(
            impl MangaScoped for $ty {
                fn manga_id(&self) -> EntityId {
                    self.manga_id
                }
            }
        )*
    };
}

/// A library entry (manga or anime).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manga {
    /// Storage id.
    pub id: EntityId,
    /// Display title.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub name: Field<String>,
    /// Source-relative link.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub link: Field<String>,
    /// Cover image URL.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub image_url: Field<String>,
    /// Author.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub author: Field<String>,
    /// Artist.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub artist: Field<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub description: Field<String>,
    /// Genre tags.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub genre: Field<Vec<String>>,
    /// Source name.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub source: Field<String>,
    /// Language code.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub lang: Field<String>,
    /// Publication status code.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub status: Field<i64>,
    /// True for manga, false for anime.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub is_manga: Field<bool>,
    /// Whether the entry is in the library.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub favorite: Field<bool>,
    /// Whether the entry comes from a local archive.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub is_local_archive: Field<bool>,
    /// Category membership.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub categories: Field<Vec<EntityId>>,
    /// When the entry was added (ms since epoch).
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub date_added: Field<i64>,
    /// Last read/watch time (ms since epoch).
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub last_read: Field<i64>,
    /// Last metadata refresh (ms since epoch).
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub last_update: Field<i64>,
    /// Remaining client fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manga {
    /// `lastRead`, reading a missing or `null` value as `0`.
    pub fn last_read_at(&self) -> i64 {
        self.last_read.or_default()
    }

    /// `lastUpdate`, reading a missing or `null` value as `0`.
    pub fn last_update_at(&self) -> i64 {
        self.last_update.or_default()
    }

    /// Returns true if `other` is newer on `lastRead` or `lastUpdate`.
    pub fn is_superseded_by(&self, other: &Manga) -> bool {
        other.last_read_at() > self.last_read_at()
            || other.last_update_at() > self.last_update_at()
    }
}

/// A library category.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Storage id.
    pub id: EntityId,
    /// Display name.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub name: Field<String>,
    /// True for manga categories, false for anime.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub for_manga: Field<bool>,
    /// Remaining client fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A chapter or episode of a manga.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Storage id.
    pub id: EntityId,
    /// Owning manga.
    pub manga_id: EntityId,
    /// Chapter title.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub name: Field<String>,
    /// Source-relative URL.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub url: Field<String>,
    /// Bookmark flag.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub is_bookmarked: Field<bool>,
    /// Read flag.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub is_read: Field<bool>,
    /// Last page read, as sent by the client.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub last_page_read: Field<String>,
    /// Remaining client fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A read/watch history row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    /// Storage id.
    pub id: EntityId,
    /// Manga the history belongs to.
    pub manga_id: EntityId,
    /// Last chapter opened.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub chapter_id: Field<EntityId>,
    /// When the chapter was opened.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub date: Field<LooseNumber>,
    /// True for manga, false for anime.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub is_manga: Field<bool>,
    /// Remaining client fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A feed item announcing a new chapter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedUpdate {
    /// Storage id.
    pub id: EntityId,
    /// Manga the chapter belongs to.
    pub manga_id: EntityId,
    /// Announced chapter name.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub chapter_name: Field<String>,
    /// Announcement time.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub date: Field<LooseNumber>,
    /// Remaining client fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl History {
    /// `date` coerced to an integer; missing or `null` reads as `0`.
    pub fn timestamp(&self) -> i64 {
        self.date.value().map_or(0, LooseNumber::as_i64)
    }
}

impl FeedUpdate {
    /// `date` coerced to an integer; missing or `null` reads as `0`.
    pub fn timestamp(&self) -> i64 {
        self.date.value().map_or(0, LooseNumber::as_i64)
    }

    /// Returns the de-duplication key `(mangaId, chapterName)`.
    pub fn dedup_key(&self) -> (EntityId, &str) {
        (self.manga_id, self.chapter_name.as_str())
    }
}

/// A link between a manga and an external tracker.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Storage id.
    pub id: EntityId,
    /// Tracked manga.
    pub manga_id: EntityId,
    /// Tracker service id.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub sync_id: Field<i64>,
    /// Progress counter reported to the tracker.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub last_chapter_read: Field<i64>,
    /// Remaining client fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Track {
    /// `lastChapterRead`, reading a missing or `null` value as `0`.
    pub fn progress(&self) -> i64 {
        self.last_chapter_read.or_default()
    }
}

/// An installed source extension.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    /// Storage id.
    pub id: EntityId,
    /// Extension name.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub name: Field<String>,
    /// Language code.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub lang: Field<String>,
    /// Installed version.
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub version: Field<String>,
    /// Remaining client fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_entity!(Manga, Category, Chapter, History, FeedUpdate, Track, Extension);
impl_manga_scoped!(Chapter, History, FeedUpdate, Track);

/// Finds an entity by id.
pub fn find_by_id<T: Entity>(items: &[T], id: EntityId) -> Option<&T> {
    items.iter().find(|item| item.id() == id)
}

/// Finds an entity by id for in-place mutation.
pub fn find_by_id_mut<T: Entity>(items: &mut [T], id: EntityId) -> Option<&mut T> {
    items.iter_mut().find(|item| item.id() == id)
}

/// Removes every entity with the given id, returning how many were removed.
pub fn remove_by_id<T: Entity>(items: &mut Vec<T>, id: EntityId) -> usize {
    let before = items.len();
    items.retain(|item| item.id() != id);
    before - items.len()
}

/// Inserts an entity, replacing the existing one with the same id.
///
/// Returns true if an existing entity was replaced.
pub fn upsert<T: Entity>(items: &mut Vec<T>, item: T) -> bool {
    match find_by_id_mut(items, item.id()) {
        Some(slot) => {
            *slot = item;
            true
        }
        None => {
            items.push(item);
            false
        }
    }
}
