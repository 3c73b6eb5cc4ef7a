//! Kotatsu backup import.
//!
//! A Kotatsu backup is a zip of JSON arrays, one per entry name. The caller
//! unpacks the archive; this module converts the entries it understands
//! into a version `"1"` document.

use crate::error::{EngineError, EngineResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use shelfsync_model::{BackupDocument, Category, EntityId, History, LooseNumber, Manga};
use std::collections::HashMap;
use tracing::{debug, info};

/// A Kotatsu category.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KotatsuCategory {
    /// Category id.
    pub category_id: EntityId,
    /// Creation time (ms).
    pub created_at: i64,
    /// Sort position.
    pub sort_key: i64,
    /// Display name.
    pub title: String,
}

/// A tag attached to a Kotatsu manga.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KotatsuTag {
    /// Tag id.
    pub id: i64,
    /// Display name.
    pub title: String,
    /// Source-specific key.
    pub key: String,
    /// Source name.
    pub source: String,
}

/// A Kotatsu manga record, embedded in favourites and history rows.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KotatsuManga {
    /// Manga id.
    pub id: EntityId,
    /// Title.
    pub title: String,
    /// Alternative title.
    pub alt_title: Option<String>,
    /// Source-relative url.
    pub url: String,
    /// Public url.
    pub public_url: String,
    /// Rating in `[0, 1]`, or negative if unknown.
    pub rating: f64,
    /// Adult content flag.
    pub nsfw: bool,
    /// Cover image url.
    pub cover_url: String,
    /// Large cover image url.
    pub large_cover_url: Option<String>,
    /// Publication state.
    pub state: Option<String>,
    /// Author name.
    pub author: Option<String>,
    /// Source name.
    pub source: String,
    /// Tags.
    pub tags: Vec<KotatsuTag>,
}

/// A Kotatsu favourite: a manga placed in a category.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KotatsuFavourite {
    /// Manga id.
    pub manga_id: EntityId,
    /// Category id.
    pub category_id: EntityId,
    /// Sort position.
    pub sort_key: i64,
    /// Time added (ms).
    pub created_at: i64,
    /// The manga.
    pub manga: KotatsuManga,
}

/// A Kotatsu reading-history row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct KotatsuHistory {
    /// Manga id.
    pub manga_id: EntityId,
    /// First read (ms).
    pub created_at: i64,
    /// Last read (ms).
    pub updated_at: i64,
    /// Last chapter read.
    pub chapter_id: EntityId,
    /// Page within the chapter.
    pub page: i64,
    /// Scroll offset within the page.
    pub scroll: f64,
    /// Read progress in `[0, 1]`.
    pub percent: f64,
    /// Total chapters.
    pub chapters: i64,
    /// The manga.
    pub manga: KotatsuManga,
}

/// The entries of an unpacked Kotatsu backup that carry library data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KotatsuBackup {
    /// `categories` entry.
    pub categories: Vec<KotatsuCategory>,
    /// `favourites` entry.
    pub favourites: Vec<KotatsuFavourite>,
    /// `history` entry.
    pub history: Vec<KotatsuHistory>,
}

/// Entries present in Kotatsu archives that carry nothing the document holds.
const PASSIVE_ENTRIES: &[&str] = &["bookmark", "bookmarks", "settings", "sources", "index"];

impl KotatsuBackup {
    /// Decodes the archive entries, given as `(name, contents)` pairs.
    ///
    /// Unknown entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Import`] if a known entry is not valid JSON of
    /// the expected shape.
    pub fn from_entries<I, N, C>(entries: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = (N, C)>,
        N: AsRef<str>,
        C: AsRef<str>,
    {
        let mut backup = Self::default();
        for (name, contents) in entries {
            let name = name.as_ref();
            let contents = contents.as_ref();
            match name {
                "categories" => backup.categories = decode(name, contents)?,
                "favourites" => backup.favourites = decode(name, contents)?,
                "history" => backup.history = decode(name, contents)?,
                passive if PASSIVE_ENTRIES.contains(&passive) => {
                    debug!(entry = name, "entry carries no library data");
                }
                _ => info!(entry = name, "ignoring unknown backup entry"),
            }
        }
        Ok(backup)
    }
}

fn decode<T: DeserializeOwned>(entry: &str, contents: &str) -> EngineResult<T> {
    serde_json::from_str(contents).map_err(|source| EngineError::Import {
        entry: entry.to_string(),
        source,
    })
}

/// Id bookkeeping for one import run.
#[derive(Debug, Default)]
struct ImportContext {
    /// Kotatsu manga id to position in `doc.manga`.
    manga_slots: HashMap<EntityId, usize>,
    /// Kotatsu manga id to position in `doc.history`.
    history_slots: HashMap<EntityId, usize>,
    next_history_id: EntityId,
}

impl ImportContext {
    fn new() -> Self {
        Self {
            next_history_id: 1,
            ..Default::default()
        }
    }

    fn manga_slot(
        &mut self,
        doc: &mut BackupDocument,
        manga: &KotatsuManga,
        id: EntityId,
        imported_at: i64,
    ) -> usize {
        *self.manga_slots.entry(id).or_insert_with(|| {
            doc.manga.push(convert_manga(manga, id, imported_at));
            doc.manga.len() - 1
        })
    }

    fn allocate_history_id(&mut self) -> EntityId {
        let id = self.next_history_id;
        self.next_history_id += 1;
        id
    }
}

fn convert_manga(manga: &KotatsuManga, id: EntityId, imported_at: i64) -> Manga {
    let author = manga.author.clone().unwrap_or_default();
    let mut extra = Map::new();
    extra.insert("customCoverImage".into(), Value::Null);
    extra.insert("customCoverFromTracker".into(), Value::Null);
    Manga {
        id,
        name: manga.title.clone().into(),
        link: manga.url.clone().into(),
        image_url: manga.cover_url.clone().into(),
        artist: author.clone().into(),
        author: author.into(),
        genre: manga
            .tags
            .iter()
            .map(|t| t.title.clone())
            .collect::<Vec<_>>()
            .into(),
        source: manga.source.clone().into(),
        lang: "en".into(),
        is_manga: true.into(),
        categories: Vec::new().into(),
        date_added: imported_at.into(),
        last_read: imported_at.into(),
        last_update: imported_at.into(),
        extra,
        ..Default::default()
    }
}

/// Converts a Kotatsu backup into a version `"1"` document.
///
/// `imported_at` stamps `dateAdded`, `lastUpdate` and, for manga without
/// history, `lastRead`.
pub fn import_kotatsu(backup: &KotatsuBackup, imported_at: i64) -> BackupDocument {
    let mut doc = BackupDocument::with_version("1");
    let mut ctx = ImportContext::new();

    doc.categories = backup
        .categories
        .iter()
        .map(|c| Category {
            id: c.category_id,
            name: c.title.clone().into(),
            for_manga: true.into(),
            ..Default::default()
        })
        .collect();

    for favourite in &backup.favourites {
        let slot = ctx.manga_slot(&mut doc, &favourite.manga, favourite.manga_id, imported_at);
        let manga = &mut doc.manga[slot];
        manga.favorite.set(true);
        let mut categories = manga.categories.or_default();
        if !categories.contains(&favourite.category_id) {
            categories.push(favourite.category_id);
        }
        manga.categories.set(categories);
    }

    for row in &backup.history {
        ctx.manga_slot(&mut doc, &row.manga, row.manga_id, imported_at);
        match ctx.history_slots.get(&row.manga_id).copied() {
            Some(existing) if doc.history[existing].timestamp() >= row.updated_at => {}
            Some(existing) => {
                let entry = &mut doc.history[existing];
                entry.chapter_id.set(row.chapter_id);
                entry.date.set(LooseNumber::Int(row.updated_at));
            }
            None => {
                let id = ctx.allocate_history_id();
                doc.history.push(History {
                    id,
                    manga_id: row.manga_id,
                    chapter_id: row.chapter_id.into(),
                    date: LooseNumber::Int(row.updated_at).into(),
                    is_manga: true.into(),
                    ..Default::default()
                });
                ctx.history_slots.insert(row.manga_id, doc.history.len() - 1);
            }
        }
    }

    for entry in &doc.history {
        if let Some(&slot) = ctx.manga_slots.get(&entry.manga_id) {
            doc.manga[slot].last_read.set(entry.timestamp());
        }
    }

    info!(
        categories = doc.categories.len(),
        manga = doc.manga.len(),
        history = doc.history.len(),
        "kotatsu backup imported"
    );
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfsync_model::Field;

    const CATEGORIES: &str = r#"[
        {"category_id": 1, "created_at": 0, "sort_key": 0, "title": "Reading"},
        {"category_id": 2, "created_at": 0, "sort_key": 1, "title": "Planned"}
    ]"#;

    fn manga_json(id: i64, title: &str) -> String {
        format!(
            r#"{{"id": {id}, "title": "{title}", "url": "/m/{id}", "public_url": "https://x/m/{id}",
               "rating": 0.5, "nsfw": false, "cover_url": "https://x/c/{id}.jpg",
               "author": "Tsutomu Nihei", "source": "MANGADEX",
               "tags": [{{"id": 1, "title": "Sci-Fi", "key": "scifi", "source": "MANGADEX"}}]}}"#
        )
    }

    fn favourites() -> String {
        format!(
            r#"[
                {{"manga_id": 10, "category_id": 1, "sort_key": 0, "created_at": 0,
                  "manga": {m10}}},
                {{"manga_id": 10, "category_id": 2, "sort_key": 0, "created_at": 0,
                  "manga": {m10}}},
                {{"manga_id": 11, "category_id": 2, "sort_key": 0, "created_at": 0,
                  "manga": {m11}}}
            ]"#,
            m10 = manga_json(10, "Blame!"),
            m11 = manga_json(11, "Biomega"),
        )
    }

    fn history() -> String {
        format!(
            r#"[
                {{"manga_id": 10, "created_at": 1, "updated_at": 500, "chapter_id": 7, "page": 3,
                  "scroll": 0.0, "percent": 0.4, "chapters": 65, "manga": {m10}}},
                {{"manga_id": 10, "created_at": 1, "updated_at": 300, "chapter_id": 6, "page": 1,
                  "scroll": 0.0, "percent": 0.3, "chapters": 65, "manga": {m10}}},
                {{"manga_id": 12, "created_at": 1, "updated_at": 900, "chapter_id": 2, "page": 0,
                  "scroll": 0.0, "percent": 0.1, "chapters": 10, "manga": {m12}}}
            ]"#,
            m10 = manga_json(10, "Blame!"),
            m12 = manga_json(12, "Abara"),
        )
    }

    fn full_backup() -> KotatsuBackup {
        KotatsuBackup::from_entries([
            ("categories", CATEGORIES.to_string()),
            ("favourites", favourites()),
            ("history", history()),
            ("settings", "{}".to_string()),
            ("mystery", "not json".to_string()),
        ])
        .unwrap()
    }

    #[test]
    fn categories_and_favourites() {
        let doc = import_kotatsu(&full_backup(), 1_000);

        assert_eq!(doc.version, "1");
        assert_eq!(doc.categories.len(), 2);
        assert!(doc.categories.iter().all(|c| c.for_manga.or_default()));
        assert_eq!(doc.categories[0].name.as_str(), "Reading");

        let blame = doc.manga_by_id(10).unwrap();
        assert!(blame.favorite.or_default());
        assert!(blame.is_manga.or_default());
        assert_eq!(blame.categories, Field::from(vec![1, 2]));
        assert_eq!(blame.author.as_str(), "Tsutomu Nihei");
        assert_eq!(blame.artist.as_str(), "Tsutomu Nihei");
        assert_eq!(blame.genre, Field::from(vec!["Sci-Fi".to_string()]));
        assert_eq!(blame.image_url.as_str(), "https://x/c/10.jpg");
        assert_eq!(blame.link.as_str(), "/m/10");
        assert_eq!(blame.source.as_str(), "MANGADEX");
        assert_eq!(blame.lang.as_str(), "en");
        assert_eq!(blame.date_added, Field::from(1_000));
        assert_eq!(blame.extra.get("customCoverImage"), Some(&Value::Null));
    }

    #[test]
    fn history_is_one_row_per_manga() {
        let doc = import_kotatsu(&full_backup(), 1_000);

        assert_eq!(doc.history.len(), 2);
        let blame = doc.history.iter().find(|h| h.manga_id == 10).unwrap();
        assert_eq!(blame.timestamp(), 500);
        assert_eq!(blame.chapter_id, Field::from(7));
        assert_eq!(doc.manga_by_id(10).unwrap().last_read_at(), 500);

        let ids: Vec<_> = doc.history.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn history_only_manga_is_not_favourite() {
        let doc = import_kotatsu(&full_backup(), 1_000);
        let abara = doc.manga_by_id(12).unwrap();
        assert!(!abara.favorite.or_default());
        assert_eq!(abara.categories, Field::from(Vec::new()));
        assert_eq!(abara.last_read_at(), 900);
        assert!(doc.orphans().is_empty());
    }

    #[test]
    fn manga_without_history_uses_import_time() {
        let doc = import_kotatsu(&full_backup(), 1_000);
        assert_eq!(doc.manga_by_id(11).unwrap().last_read_at(), 1_000);
    }

    #[test]
    fn bad_entry_is_reported() {
        let err = KotatsuBackup::from_entries([("favourites", "{")]).unwrap_err();
        assert!(matches!(err, EngineError::Import { ref entry, .. } if entry == "favourites"));
    }

    #[test]
    fn missing_optional_fields_default() {
        let backup = KotatsuBackup::from_entries([(
            "favourites",
            r#"[{"manga_id": 3, "category_id": 9, "manga": {"id": 3, "title": "T"}}]"#,
        )])
        .unwrap();
        let doc = import_kotatsu(&backup, 0);
        let manga = doc.manga_by_id(3).unwrap();
        assert_eq!(manga.author.as_str(), "");
        assert_eq!(manga.genre, Field::from(Vec::<String>::new()));
    }

    #[test]
    fn empty_backup_gives_empty_document() {
        let doc = import_kotatsu(&KotatsuBackup::default(), 0);
        assert_eq!(doc, BackupDocument::with_version("1"));
    }
}
