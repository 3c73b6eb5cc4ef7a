//! Patch replay against a transactional store.

use shelfsync_engine::{EngineError, EngineResult, PatchProcessor, PatchReport};
use shelfsync_model::{BackupDocument, Chapter, Manga};
use shelfsync_protocol::{ActionType, ChangeRecord};
use shelfsync_storage::{BackupStore, FileBackend, StorageBackend, UserId};
use std::sync::Arc;
use uuid::Uuid;

fn seed(store: &BackupStore, user: UserId) {
    let mut doc = BackupDocument::empty();
    doc.manga.push(Manga {
        id: 1,
        name: "Blame!".into(),
        ..Default::default()
    });
    doc.chapters.push(Chapter {
        id: 10,
        manga_id: 1,
        name: "Ch. 1".into(),
        ..Default::default()
    });
    let text = doc.to_json().unwrap();
    store
        .transaction::<_, _, EngineError>(user, |txn| {
            txn.set_document(text);
            Ok(())
        })
        .unwrap();
}

fn sync(store: &BackupStore, user: UserId, records: &[ChangeRecord]) -> EngineResult<PatchReport> {
    let processor = PatchProcessor::default();
    store.transaction(user, |txn| {
        let text = txn.document().unwrap_or_default().to_string();
        let mut doc = BackupDocument::from_json(&text)?;
        let report = processor.apply(&mut doc, records, txn)?;
        txn.set_document(doc.to_json()?);
        Ok(report)
    })
}

fn stored(store: &BackupStore, user: UserId) -> BackupDocument {
    let text = store.read_document(user).unwrap().unwrap();
    BackupDocument::from_json(&text).unwrap()
}

fn rename(name: &str, date: i64) -> ChangeRecord {
    let manga = Manga {
        id: 1,
        name: name.into(),
        ..Default::default()
    };
    ChangeRecord::with_entity(ActionType::UpdateItem, Some(1), &manga, date).unwrap()
}

fn read_chapter(read: bool, date: i64) -> ChangeRecord {
    let chapter = Chapter {
        id: 10,
        manga_id: 1,
        name: "Ch. 1".into(),
        is_read: read.into(),
        ..Default::default()
    };
    ChangeRecord::with_entity(ActionType::UpdateChapter, Some(10), &chapter, date).unwrap()
}

#[test]
fn last_writer_wins_across_batches() {
    let store = BackupStore::in_memory();
    let user = Uuid::new_v4();
    seed(&store, user);

    sync(&store, user, &[rename("newer", 200)]).unwrap();
    let report = sync(&store, user, &[rename("older", 100)]).unwrap();

    assert_eq!(report.stale, 1);
    assert_eq!(stored(&store, user).manga[0].name.as_str(), "newer");
    assert_eq!(store.timeline(user).unwrap().len(), 1);
}

#[test]
fn later_record_in_batch_wins_regardless_of_position() {
    let store = BackupStore::in_memory();
    let user = Uuid::new_v4();
    seed(&store, user);

    sync(&store, user, &[read_chapter(false, 30), read_chapter(true, 10)]).unwrap();
    assert!(!stored(&store, user).chapters[0].is_read.or_default());
}

#[test]
fn users_are_isolated() {
    let store = BackupStore::in_memory();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    seed(&store, alice);
    seed(&store, bob);

    sync(&store, alice, &[rename("alice", 500)]).unwrap();
    let report = sync(&store, bob, &[rename("bob", 100)]).unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(stored(&store, bob).manga[0].name.as_str(), "bob");
    assert_eq!(stored(&store, alice).manga[0].name.as_str(), "alice");
}

#[test]
fn failed_transaction_leaves_no_trace() {
    let store = BackupStore::in_memory();
    let user = Uuid::new_v4();
    seed(&store, user);
    let before = store.read_document(user).unwrap();

    let processor = PatchProcessor::default();
    let result: EngineResult<()> = store.transaction(user, |txn| {
        let mut doc = BackupDocument::from_json(txn.document().unwrap_or_default())?;
        processor.apply(&mut doc, &[rename("lost", 100)], txn)?;
        txn.set_document(doc.to_json()?);
        Err(BackupDocument::from_json("not json").unwrap_err().into())
    });

    assert!(result.is_err());
    assert_eq!(store.read_document(user).unwrap(), before);
    assert!(store.timeline(user).unwrap().is_empty());
}

#[test]
fn change_log_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let user = Uuid::new_v4();
    {
        let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::open(dir.path()).unwrap());
        let store = BackupStore::new(backend);
        seed(&store, user);
        sync(&store, user, &[rename("newer", 200)]).unwrap();
    }

    let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::open(dir.path()).unwrap());
    let store = BackupStore::new(backend);
    let report = sync(&store, user, &[rename("older", 100)]).unwrap();

    assert_eq!(report.stale, 1);
    assert_eq!(stored(&store, user).manga[0].name.as_str(), "newer");
}
