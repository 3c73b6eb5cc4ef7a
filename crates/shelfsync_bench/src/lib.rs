//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::Rng;
use shelfsync_model::{BackupDocument, Category, Chapter, EntityId, History, LooseNumber, Manga};
use shelfsync_protocol::{ActionType, ChangeRecord};

/// Chapter ids are `manga_id * CHAPTER_STRIDE + n`.
pub const CHAPTER_STRIDE: EntityId = 10_000;

/// Generate a library of `manga_count` manga with `chapters` chapters each
/// and randomised reading progress.
pub fn random_library(manga_count: usize, chapters: usize) -> BackupDocument {
    let mut rng = rand::thread_rng();
    let mut doc = BackupDocument::empty();
    doc.categories.push(Category {
        id: 1,
        name: "Reading".into(),
        for_manga: true.into(),
        ..Default::default()
    });

    for m in 1..=manga_count as EntityId {
        doc.manga.push(Manga {
            id: m,
            name: format!("Manga {m}").into(),
            is_manga: true.into(),
            favorite: rng.gen::<bool>().into(),
            categories: vec![1].into(),
            last_read: rng.gen_range(0..1_000_000i64).into(),
            last_update: rng.gen_range(0..1_000_000i64).into(),
            ..Default::default()
        });
        for n in 0..chapters as EntityId {
            doc.chapters.push(Chapter {
                id: m * CHAPTER_STRIDE + n,
                manga_id: m,
                name: format!("Ch. {n}").into(),
                is_read: rng.gen_bool(0.5).into(),
                ..Default::default()
            });
        }
        doc.history.push(History {
            id: m,
            manga_id: m,
            chapter_id: (m * CHAPTER_STRIDE).into(),
            date: LooseNumber::Int(rng.gen_range(0..1_000_000)).into(),
            is_manga: true.into(),
            ..Default::default()
        });
    }
    doc
}

/// Generate `count` `UPDATE_CHAPTER` records against a library built by
/// [`random_library`].
pub fn random_batch(manga_count: usize, chapters: usize, count: usize) -> Vec<ChangeRecord> {
    let mut rng = rand::thread_rng();
    (0..count)
        .filter_map(|_| {
            let manga_id = rng.gen_range(1..=manga_count.max(1) as EntityId);
            let n = rng.gen_range(0..chapters.max(1) as EntityId);
            let id = manga_id * CHAPTER_STRIDE + n;
            let chapter = Chapter {
                id,
                manga_id,
                name: format!("Ch. {n}").into(),
                is_read: true.into(),
                ..Default::default()
            };
            let date = rng.gen_range(0..1_000_000);
            ChangeRecord::with_entity(ActionType::UpdateChapter, Some(id), &chapter, date).ok()
        })
        .collect()
}
