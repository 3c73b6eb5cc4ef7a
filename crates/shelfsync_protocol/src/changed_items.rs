//! Explicit deletion and update intents accompanying a bulk merge.

use serde::{Deserialize, Serialize};
use shelfsync_model::EntityId;
use std::collections::{HashMap, HashSet};

/// A manga the client deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedManga {
    /// Deleted manga id.
    pub manga_id: EntityId,
}

/// A category the client deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCategory {
    /// Deleted category id.
    pub category_id: EntityId,
}

/// A chapter the client changed or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedChapter {
    /// Chapter id.
    pub chapter_id: EntityId,
    /// Owning manga id.
    pub manga_id: EntityId,
    /// True if the chapter was deleted.
    #[serde(default)]
    pub deleted: bool,
    /// New bookmark flag.
    #[serde(default)]
    pub is_bookmarked: bool,
    /// New read flag.
    #[serde(default)]
    pub is_read: bool,
    /// New last page read.
    #[serde(default)]
    pub last_page_read: String,
}

/// The `changedItems` block of a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangedItems {
    /// Manga deleted on the client.
    pub deleted_mangas: Vec<DeletedManga>,
    /// Categories deleted on the client.
    pub deleted_categories: Vec<DeletedCategory>,
    /// Chapters changed or deleted on the client.
    pub updated_chapters: Vec<UpdatedChapter>,
}

impl ChangedItems {
    /// Returns true if no intent is present.
    pub fn is_empty(&self) -> bool {
        self.deleted_mangas.is_empty()
            && self.deleted_categories.is_empty()
            && self.updated_chapters.is_empty()
    }

    /// Returns the ids of deleted manga.
    pub fn deleted_manga_ids(&self) -> HashSet<EntityId> {
        self.deleted_mangas.iter().map(|d| d.manga_id).collect()
    }

    /// Returns the ids of deleted categories.
    pub fn deleted_category_ids(&self) -> HashSet<EntityId> {
        self.deleted_categories.iter().map(|d| d.category_id).collect()
    }

    /// Returns chapter intents keyed by chapter id; later entries win.
    pub fn chapter_intents(&self) -> HashMap<EntityId, &UpdatedChapter> {
        self.updated_chapters
            .iter()
            .map(|c| (c.chapter_id, c))
            .collect()
    }

    /// Returns the chapter deletion intents.
    pub fn deleted_chapters(&self) -> impl Iterator<Item = &UpdatedChapter> {
        self.updated_chapters.iter().filter(|c| c.deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_partial_block() {
        let json = r#"{"deletedMangas":[{"mangaId":3}],
            "updatedChapters":[{"chapterId":9,"mangaId":3,"deleted":true}]}"#;
        let items: ChangedItems = serde_json::from_str(json).unwrap();
        assert!(items.deleted_categories.is_empty());
        assert!(items.deleted_manga_ids().contains(&3));
        assert_eq!(items.deleted_chapters().count(), 1);
        assert_eq!(items.updated_chapters[0].last_page_read, "");
    }

    #[test]
    fn empty_block() {
        let items: ChangedItems = serde_json::from_str("{}").unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn later_chapter_intent_wins() {
        let items = ChangedItems {
            updated_chapters: vec![
                UpdatedChapter {
                    chapter_id: 1,
                    manga_id: 1,
                    is_read: false,
                    ..Default::default()
                },
                UpdatedChapter {
                    chapter_id: 1,
                    manga_id: 1,
                    is_read: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert!(items.chapter_intents()[&1].is_read);
    }
}
