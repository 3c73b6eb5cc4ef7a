//! End-to-end flows through the sync server.

use shelfsync_model::{BackupDocument, Chapter, Manga};
use shelfsync_protocol::{
    ActionType, BackupPayload, ChangeRecord, ChangedItems, MergeRequest, ShelfMessage,
    ShelfReply, SyncRequest, UpdatedChapter, UploadRequest,
};
use shelfsync_server::{ServerConfig, SyncServer};
use shelfsync_storage::{BackupStore, FileBackend, StorageBackend};
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

fn library(chapters: i64) -> BackupDocument {
    let mut doc = BackupDocument::empty();
    doc.manga.push(Manga {
        id: 1,
        name: "Blame!".into(),
        ..Default::default()
    });
    for id in 0..chapters {
        doc.chapters.push(Chapter {
            id,
            manga_id: 1,
            name: format!("Ch. {id}").into(),
            ..Default::default()
        });
    }
    doc
}

fn mark_read(id: i64, date: i64) -> ChangeRecord {
    let chapter = Chapter {
        id,
        manga_id: 1,
        name: format!("Ch. {id}").into(),
        is_read: true.into(),
        ..Default::default()
    };
    ChangeRecord::with_entity(ActionType::UpdateChapter, Some(id), &chapter, date).unwrap()
}

fn download(server: &SyncServer, user: Uuid) -> BackupDocument {
    let text = server.download(user).unwrap().backup_data;
    BackupDocument::from_json(&text).unwrap()
}

#[test]
fn concurrent_devices_do_not_lose_updates() {
    let server = Arc::new(SyncServer::new(ServerConfig::default()));
    let user = Uuid::new_v4();
    server
        .upload_full(
            user,
            &UploadRequest {
                backup_data: BackupPayload::document(&library(40)).unwrap(),
            },
        )
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|device| {
            let server = Arc::clone(&server);
            thread::spawn(move || {
                for n in 0..10 {
                    let id = device * 10 + n;
                    let request = SyncRequest::new(vec![mark_read(id, 1_000 + id)]);
                    server.sync(user, &request).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let doc = download(&server, user);
    assert!(doc.chapters.iter().all(|c| c.is_read.or_default()));
    assert_eq!(server.store().timeline(user).unwrap().len(), 40);
    assert_eq!(server.stats().syncs, 40);
}

#[test]
fn merge_then_sync_round_trip() {
    let server = SyncServer::new(ServerConfig::default());
    let user = Uuid::new_v4();
    server.initialize(user).unwrap();

    let merged = server
        .merge(
            user,
            &MergeRequest {
                backup_data: BackupPayload::document(&library(2)).unwrap(),
                changed_items: ChangedItems::default(),
            },
        )
        .unwrap();
    let doc = BackupDocument::from_json(&merged.backup_data).unwrap();
    assert_eq!(doc.manga.len(), 1);
    assert_eq!(doc.chapters.len(), 2);

    let mut client = library(2);
    client.chapters[0].is_read = true.into();
    let intents = ChangedItems {
        updated_chapters: vec![UpdatedChapter {
            chapter_id: 1,
            manga_id: 1,
            deleted: true,
            ..Default::default()
        }],
        ..Default::default()
    };
    server
        .merge(
            user,
            &MergeRequest {
                backup_data: BackupPayload::document(&client).unwrap(),
                changed_items: intents,
            },
        )
        .unwrap();

    let doc = download(&server, user);
    assert_eq!(doc.chapters.len(), 1);
    // Without an intent the stored chapter is kept.
    assert!(!doc.chapters[0].is_read.or_default());

    let reply = server.handle_message(
        user,
        ShelfMessage::Sync(SyncRequest::new(vec![mark_read(0, 10)])),
    );
    assert!(matches!(reply, ShelfReply::Hash(_)));
    assert!(download(&server, user).chapters[0].is_read.or_default());
}

#[test]
fn file_backed_server_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let user = Uuid::new_v4();
    let open = || {
        let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::open(dir.path()).unwrap());
        SyncServer::with_store(ServerConfig::default(), BackupStore::new(backend))
    };

    let hash = {
        let server = open();
        server.initialize(user).unwrap();
        server
            .upload_full(
                user,
                &UploadRequest {
                    backup_data: BackupPayload::document(&library(3)).unwrap(),
                },
            )
            .unwrap();
        server
            .sync(user, &SyncRequest::new(vec![mark_read(2, 500)]))
            .unwrap()
    };

    let server = open();
    assert_eq!(server.check(user).unwrap(), hash);
    let stale = server
        .sync(user, &SyncRequest::new(vec![mark_read_as(2, false, 100)]))
        .unwrap();
    assert_eq!(stale, hash);
    assert!(download(&server, user).chapters[2].is_read.or_default());
}

fn mark_read_as(id: i64, read: bool, date: i64) -> ChangeRecord {
    let chapter = Chapter {
        id,
        manga_id: 1,
        name: format!("Ch. {id}").into(),
        is_read: read.into(),
        ..Default::default()
    };
    ChangeRecord::with_entity(ActionType::UpdateChapter, Some(id), &chapter, date).unwrap()
}
