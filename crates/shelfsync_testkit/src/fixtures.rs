//! Test fixtures and server helpers.
//!
//! Provides convenience functions for building documents and setting up
//! servers over temporary storage.

use shelfsync_model::{
    BackupDocument, Category, Chapter, EntityId, FeedUpdate, History, LooseNumber, Manga, Track,
};
use shelfsync_protocol::{ActionType, BackupPayload, ChangeRecord, UploadRequest};
use shelfsync_server::{ServerConfig, SyncServer};
use shelfsync_storage::{BackupStore, FileBackend, StorageBackend, UserId};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// A file-backed test server with automatic cleanup.
pub struct TestServer {
    /// The server instance.
    pub server: SyncServer,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestServer {
    /// Creates a server over a fresh temporary data directory.
    pub fn file() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Creates a server with a custom configuration.
    pub fn with_config(config: ServerConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let server = open_server(temp_dir.path(), config);
        Self { server, temp_dir }
    }

    /// Returns the data directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Drops the server and reopens it over the same directory.
    pub fn reopen(self) -> Self {
        let Self { server, temp_dir } = self;
        let config = server.config().clone();
        drop(server);
        let server = open_server(temp_dir.path(), config);
        Self { server, temp_dir }
    }

    /// Stores `doc` for `user`.
    pub fn upload(&self, user: UserId, doc: &BackupDocument) {
        let request = UploadRequest {
            backup_data: BackupPayload::document(doc).expect("Failed to encode document"),
        };
        self.server
            .upload_full(user, &request)
            .expect("Failed to upload document");
    }

    /// Returns the stored document of `user`.
    pub fn document(&self, user: UserId) -> BackupDocument {
        let text = self
            .server
            .download(user)
            .expect("No stored document")
            .backup_data;
        BackupDocument::from_json(&text).expect("Stored document is invalid")
    }
}

impl std::ops::Deref for TestServer {
    type Target = SyncServer;

    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

fn open_server(path: &Path, config: ServerConfig) -> SyncServer {
    let backend: Arc<dyn StorageBackend> =
        Arc::new(FileBackend::open(path).expect("Failed to open file backend"));
    SyncServer::with_store(config, BackupStore::new(backend))
}

/// Runs a test with a temporary file-backed server.
pub fn with_test_server<F, R>(f: F) -> R
where
    F: FnOnce(&TestServer) -> R,
{
    let server = TestServer::file();
    f(&server)
}

/// Builds a minimal manga.
pub fn manga(id: EntityId, name: &str) -> Manga {
    Manga {
        id,
        name: name.into(),
        is_manga: true.into(),
        categories: Vec::new().into(),
        ..Default::default()
    }
}

/// Builds a minimal chapter.
pub fn chapter(id: EntityId, manga_id: EntityId, name: &str) -> Chapter {
    Chapter {
        id,
        manga_id,
        name: name.into(),
        ..Default::default()
    }
}

/// Builds an `UPDATE_ITEM` record renaming manga `id`.
pub fn rename_record(id: EntityId, name: &str, client_date: i64) -> ChangeRecord {
    ChangeRecord::with_entity(ActionType::UpdateItem, Some(id), &manga(id, name), client_date)
        .expect("Failed to encode manga")
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A library of `manga_count` manga with `chapters_per_manga` chapters
    /// each, plus one category, history row, feed item and track per manga.
    pub fn library(manga_count: i64, chapters_per_manga: i64) -> BackupDocument {
        let mut doc = BackupDocument::empty();
        doc.categories.push(Category {
            id: 1,
            name: "Reading".into(),
            for_manga: true.into(),
            ..Default::default()
        });

        for m in 1..=manga_count {
            let mut entry = manga(m, &format!("Manga {m}"));
            entry.categories = vec![1].into();
            entry.last_read = (m * 10).into();
            doc.manga.push(entry);

            for c in 0..chapters_per_manga {
                let id = m * 1_000 + c;
                doc.chapters.push(chapter(id, m, &format!("Ch. {c}")));
            }
            doc.history.push(History {
                id: m,
                manga_id: m,
                chapter_id: (m * 1_000).into(),
                date: LooseNumber::Int(m * 10).into(),
                is_manga: true.into(),
                ..Default::default()
            });
            doc.updates.push(FeedUpdate {
                id: m,
                manga_id: m,
                chapter_name: "Ch. 0".into(),
                date: LooseNumber::Int(m * 10).into(),
                ..Default::default()
            });
            doc.tracks.push(Track {
                id: m,
                manga_id: m,
                sync_id: 1.into(),
                last_chapter_read: 0.into(),
                ..Default::default()
            });
        }
        doc
    }

    /// Two diverging copies of one library: the second has read further in
    /// manga 1 and added manga `manga_count + 1`.
    pub fn diverged(manga_count: i64) -> (BackupDocument, BackupDocument) {
        let base = library(manga_count, 2);
        let mut ahead = base.clone();
        if let Some(first) = ahead.manga.first_mut() {
            first.last_read = (first.last_read_at() + 1_000).into();
        }
        let extra = manga_count + 1;
        ahead.manga.push(manga(extra, "Newcomer"));
        ahead.chapters.push(chapter(extra * 1_000, extra, "Ch. 0"));
        (base, ahead)
    }
}
