//! Property-based test generators using proptest.
//!
//! Documents produced here are orphan-free, have unique ids per collection,
//! at most one history row per manga and unique feed keys, which are the
//! shapes clients produce.

use proptest::prelude::*;
use shelfsync_model::{
    BackupDocument, Category, Chapter, EntityId, FeedUpdate, History, LooseNumber, Manga, Track,
};
use shelfsync_protocol::{
    ActionType, ChangeRecord, ChangedItems, DeletedCategory, DeletedManga, UpdatedChapter,
};
use std::collections::BTreeSet;

/// Category ids used by generated documents.
pub const CATEGORY_IDS: [EntityId; 3] = [1, 2, 3];

/// Id offset of chapters in generated documents.
pub const CHAPTER_ID_BASE: EntityId = 1_000;

/// Strategy for generating manga with the given id.
pub fn manga_strategy(id: EntityId) -> impl Strategy<Value = Manga> {
    (
        "[A-Za-z][A-Za-z ]{0,11}",
        0i64..1_000,
        0i64..1_000,
        any::<bool>(),
        prop::collection::btree_set(prop::sample::select(CATEGORY_IDS.to_vec()), 0..3),
    )
        .prop_map(move |(name, last_read, last_update, favorite, categories)| Manga {
            id,
            name: name.into(),
            last_read: last_read.into(),
            last_update: last_update.into(),
            favorite: favorite.into(),
            is_manga: true.into(),
            categories: categories.into_iter().collect::<Vec<_>>().into(),
            ..Default::default()
        })
}

/// Per-manga children of a generated document.
#[derive(Debug, Clone)]
struct Children {
    chapters: Vec<(bool, bool)>,
    history: Option<i64>,
    feeds: BTreeSet<u8>,
    track: Option<i64>,
}

fn children_strategy() -> impl Strategy<Value = Children> {
    (
        prop::collection::vec((any::<bool>(), any::<bool>()), 0..4),
        prop::option::of(0i64..1_000),
        prop::collection::btree_set(0u8..4, 0..3),
        prop::option::of(0i64..50),
    )
        .prop_map(|(chapters, history, feeds, track)| Children {
            chapters,
            history,
            feeds,
            track,
        })
}

/// Strategy for generating orphan-free documents with 1 to `max_manga`
/// manga.
pub fn document_strategy(max_manga: usize) -> impl Strategy<Value = BackupDocument> {
    (1..=max_manga.max(1))
        .prop_flat_map(|count| {
            let manga: Vec<_> = (1..=count as EntityId).map(manga_strategy).collect();
            let children = prop::collection::vec(children_strategy(), count);
            (manga, children)
        })
        .prop_map(|(manga, children)| build_document(manga, children))
}

fn build_document(manga: Vec<Manga>, children: Vec<Children>) -> BackupDocument {
    let mut doc = BackupDocument::empty();
    doc.categories = CATEGORY_IDS
        .iter()
        .map(|&id| Category {
            id,
            name: format!("Category {id}").into(),
            for_manga: true.into(),
            ..Default::default()
        })
        .collect();

    for (entry, kids) in manga.iter().zip(children) {
        let m = entry.id;
        for (n, (is_read, is_bookmarked)) in kids.chapters.into_iter().enumerate() {
            doc.chapters.push(Chapter {
                id: CHAPTER_ID_BASE * m + n as EntityId,
                manga_id: m,
                name: format!("Ch. {n}").into(),
                is_read: is_read.into(),
                is_bookmarked: is_bookmarked.into(),
                ..Default::default()
            });
        }
        if let Some(date) = kids.history {
            doc.history.push(History {
                id: m,
                manga_id: m,
                chapter_id: (CHAPTER_ID_BASE * m).into(),
                date: LooseNumber::Int(date).into(),
                is_manga: true.into(),
                ..Default::default()
            });
        }
        for n in kids.feeds {
            doc.updates.push(FeedUpdate {
                id: m * 10 + EntityId::from(n),
                manga_id: m,
                chapter_name: format!("Ch. {n}").into(),
                date: LooseNumber::Int(EntityId::from(n)).into(),
                ..Default::default()
            });
        }
        if let Some(last_chapter_read) = kids.track {
            doc.tracks.push(Track {
                id: m,
                manga_id: m,
                sync_id: 1.into(),
                last_chapter_read: last_chapter_read.into(),
                ..Default::default()
            });
        }
    }
    doc.manga = manga;
    doc
}

/// Strategy for generating intents against manga ids `1..=max_manga`.
pub fn changed_items_strategy(max_manga: usize) -> impl Strategy<Value = ChangedItems> {
    let max = max_manga.max(1) as EntityId;
    (
        prop::collection::btree_set(1..=max, 0..3),
        prop::collection::btree_set(prop::sample::select(CATEGORY_IDS.to_vec()), 0..2),
        prop::collection::vec(
            (1..=max, 0i64..4, any::<bool>(), any::<bool>(), any::<bool>()),
            0..4,
        ),
    )
        .prop_map(|(manga, categories, chapters)| ChangedItems {
            deleted_mangas: manga
                .into_iter()
                .map(|manga_id| DeletedManga { manga_id })
                .collect(),
            deleted_categories: categories
                .into_iter()
                .map(|category_id| DeletedCategory { category_id })
                .collect(),
            updated_chapters: chapters
                .into_iter()
                .map(|(manga_id, n, deleted, is_read, is_bookmarked)| UpdatedChapter {
                    chapter_id: CHAPTER_ID_BASE * manga_id + n,
                    manga_id,
                    deleted,
                    is_bookmarked,
                    is_read,
                    last_page_read: String::new(),
                })
                .collect(),
        })
}

/// Strategy for generating one well-formed change record touching manga
/// ids `1..=max_manga`.
pub fn change_record_strategy(max_manga: usize) -> impl Strategy<Value = ChangeRecord> {
    let max = max_manga.max(1) as EntityId;
    prop_oneof![
        3 => (1..=max, "[a-z]{1,8}", 0i64..10_000).prop_map(|(id, name, date)| {
            let manga = Manga {
                id,
                name: name.into(),
                ..Default::default()
            };
            encode(ActionType::UpdateItem, Some(id), &manga, date)
        }),
        3 => (1..=max, 0i64..4, any::<bool>(), 0i64..10_000).prop_map(|(m, n, is_read, date)| {
            let id = CHAPTER_ID_BASE * m + n;
            let chapter = Chapter {
                id,
                manga_id: m,
                name: format!("Ch. {n}").into(),
                is_read: is_read.into(),
                ..Default::default()
            };
            encode(ActionType::UpdateChapter, Some(id), &chapter, date)
        }),
        2 => (1..=max + 2, 0i64..10_000).prop_map(|(m, date)| {
            let chapter = Chapter {
                id: CHAPTER_ID_BASE * m + 9,
                manga_id: m,
                name: "Ch. 9".into(),
                ..Default::default()
            };
            encode(ActionType::AddChapter, None, &chapter, date)
        }),
        1 => (1..=max, 0i64..10_000)
            .prop_map(|(id, date)| ChangeRecord::new(ActionType::RemoveItem, Some(id), "", date)),
        1 => (0i64..10_000)
            .prop_map(|date| ChangeRecord::new(ActionType::ClearUpdates, None, "", date)),
    ]
}

fn encode<T: serde::Serialize>(
    action: ActionType,
    id: Option<EntityId>,
    entity: &T,
    date: i64,
) -> ChangeRecord {
    ChangeRecord::with_entity(action, id, entity, date).expect("entities always encode")
}

/// Strategy for generating a non-empty change batch.
pub fn change_batch_strategy(
    max_manga: usize,
    max_records: usize,
) -> impl Strategy<Value = Vec<ChangeRecord>> {
    prop::collection::vec(change_record_strategy(max_manga), 1..max_records.max(2))
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
