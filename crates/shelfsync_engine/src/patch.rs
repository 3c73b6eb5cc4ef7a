//! Incremental patch replay.
//!
//! Records are applied in ascending `clientDate` order. Update actions are
//! arbitrated against the change log: an update older than the newest
//! accepted update for the same `(action, isarId)` is dropped, which makes
//! the outcome last-writer-wins across batches and devices.

use crate::config::PatchOptions;
use crate::error::{EngineError, EngineResult};
use shelfsync_model::{
    find_by_id_mut, remove_by_id, upsert, BackupDocument, Category, Chapter, Collection, Entity,
    EntityId, Extension, FeedUpdate, History, Manga, Track,
};
use shelfsync_protocol::{ActionKind, ActionType, ChangeRecord, ProtocolResult};
use shelfsync_storage::ChangeLog;
use tracing::{debug, info, instrument, warn};

/// Counters describing what a patch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchReport {
    /// Records that changed the document.
    pub applied: usize,
    /// Accepted records whose target no longer exists.
    pub missing: usize,
    /// Updates superseded by a newer logged update.
    pub stale: usize,
    /// Records with an unknown action.
    pub unknown: usize,
    /// Records with a missing `isarId` or a malformed payload.
    pub invalid: usize,
    /// Children dropped by the final orphan pass.
    pub orphans_pruned: usize,
    /// True if the document version has no patch rules and nothing ran.
    pub version_skipped: bool,
}

impl PatchReport {
    /// Number of records that were not applied.
    pub fn skipped(&self) -> usize {
        self.stale + self.unknown + self.invalid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    Missing,
    Stale,
}

/// A decoded entity payload.
#[derive(Debug)]
enum Payload {
    Manga(Manga),
    Category(Category),
    Chapter(Chapter),
    History(History),
    Update(FeedUpdate),
    Extension(Extension),
    Track(Track),
}

impl Payload {
    fn parse(action: ActionType, record: &ChangeRecord) -> ProtocolResult<Self> {
        Ok(match action.collection() {
            Collection::Manga => Payload::Manga(record.payload(action)?),
            Collection::Categories => Payload::Category(record.payload(action)?),
            Collection::Chapters => Payload::Chapter(record.payload(action)?),
            Collection::History => Payload::History(record.payload(action)?),
            Collection::Updates => Payload::Update(record.payload(action)?),
            Collection::Extensions => Payload::Extension(record.payload(action)?),
            Collection::Tracks => Payload::Track(record.payload(action)?),
        })
    }

    /// Inserts the entity, replacing one with the same id.
    fn insert(self, doc: &mut BackupDocument) -> bool {
        match self {
            Payload::Manga(e) => upsert(&mut doc.manga, e),
            Payload::Category(e) => upsert(&mut doc.categories, e),
            Payload::Chapter(e) => upsert(&mut doc.chapters, e),
            Payload::History(e) => upsert(&mut doc.history, e),
            Payload::Update(e) => upsert(&mut doc.updates, e),
            Payload::Extension(e) => upsert(&mut doc.extensions, e),
            Payload::Track(e) => upsert(&mut doc.tracks, e),
        }
    }

    /// Overwrites the entity stored under `id`; returns false if absent.
    fn overwrite(self, doc: &mut BackupDocument, id: EntityId) -> bool {
        match self {
            Payload::Manga(e) => overwrite(&mut doc.manga, id, e),
            Payload::Category(e) => overwrite(&mut doc.categories, id, e),
            Payload::Chapter(e) => overwrite(&mut doc.chapters, id, e),
            Payload::History(e) => overwrite(&mut doc.history, id, e),
            Payload::Update(e) => overwrite(&mut doc.updates, id, e),
            Payload::Extension(e) => overwrite(&mut doc.extensions, id, e),
            Payload::Track(e) => overwrite(&mut doc.tracks, id, e),
        }
    }
}

fn overwrite<T: Entity>(items: &mut [T], id: EntityId, mut entity: T) -> bool {
    match find_by_id_mut(items, id) {
        Some(slot) => {
            entity.set_id(id);
            *slot = entity;
            true
        }
        None => false,
    }
}

/// Replays change batches onto a document.
#[derive(Debug, Clone, Default)]
pub struct PatchProcessor {
    options: PatchOptions,
}

impl PatchProcessor {
    /// Creates a processor.
    pub fn new(options: PatchOptions) -> Self {
        Self { options }
    }

    /// Returns the options.
    pub fn options(&self) -> &PatchOptions {
        &self.options
    }

    /// Applies `records` to `doc`, consulting and extending `log`.
    ///
    /// Per-record problems (unknown action, missing `isarId`, malformed
    /// payload) are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only if the change log fails; the caller must then
    /// discard both the document and any log rows recorded so far.
    #[instrument(skip_all, fields(records = records.len(), version = %doc.version))]
    pub fn apply<L>(
        &self,
        doc: &mut BackupDocument,
        records: &[ChangeRecord],
        log: &mut L,
    ) -> EngineResult<PatchReport>
    where
        L: ChangeLog + ?Sized,
    {
        let mut report = PatchReport::default();
        if !self.options.accepts(&doc.version) {
            warn!("unsupported document version, patch skipped");
            report.version_skipped = true;
            return Ok(report);
        }

        let mut ordered: Vec<&ChangeRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.client_date);

        for record in ordered {
            let Some(action) = record.action_type() else {
                warn!(action = %record.action, "unknown action, skipping");
                report.unknown += 1;
                continue;
            };
            match apply_record(doc, action, record, log) {
                Ok(Outcome::Applied) => report.applied += 1,
                Ok(Outcome::Missing) => report.missing += 1,
                Ok(Outcome::Stale) => report.stale += 1,
                Err(EngineError::Protocol(err)) => {
                    warn!(
                        %action,
                        client_date = record.client_date,
                        %err,
                        "invalid record, skipping"
                    );
                    report.invalid += 1;
                }
                Err(err) => return Err(err),
            }
        }

        if self.options.prune_orphans {
            report.orphans_pruned = doc.prune_orphans().total();
        }
        info!(
            applied = report.applied,
            skipped = report.skipped(),
            orphans = report.orphans_pruned,
            "patch complete"
        );
        Ok(report)
    }
}

fn apply_record<L>(
    doc: &mut BackupDocument,
    action: ActionType,
    record: &ChangeRecord,
    log: &mut L,
) -> EngineResult<Outcome>
where
    L: ChangeLog + ?Sized,
{
    let outcome = match action.kind() {
        ActionKind::Add => {
            let replaced = Payload::parse(action, record)?.insert(doc);
            if replaced {
                debug!(%action, "add replaced an existing entity");
            }
            Outcome::Applied
        }
        ActionKind::Remove => {
            let id = record.target_id(action)?;
            found(remove(doc, action, id))
        }
        ActionKind::Clear => {
            clear(doc, action);
            Outcome::Applied
        }
        ActionKind::Update => {
            let id = record.target_id(action)?;
            let payload = Payload::parse(action, record)?;
            if let Some(latest) = log.latest(action.as_str(), Some(id))? {
                if latest.client_date > record.client_date {
                    debug!(%action, id, newer = latest.client_date, "stale update dropped");
                    return Ok(Outcome::Stale);
                }
            }
            log.record(action.as_str(), Some(id), &record.data, record.client_date)?;
            found(payload.overwrite(doc, id))
        }
    };
    debug!(%action, id = ?record.isar_id, ?outcome, "record processed");
    Ok(outcome)
}

fn found(hit: bool) -> Outcome {
    if hit {
        Outcome::Applied
    } else {
        Outcome::Missing
    }
}

fn remove(doc: &mut BackupDocument, action: ActionType, id: EntityId) -> bool {
    match action {
        ActionType::RemoveItem => doc.remove_manga_cascade(id),
        ActionType::RemoveCategory => {
            let removed = remove_by_id(&mut doc.categories, id) > 0;
            for manga in &mut doc.manga {
                if let Some(categories) = manga.categories.value_mut() {
                    categories.retain(|c| *c != id);
                }
            }
            removed
        }
        ActionType::RemoveChapter => remove_by_id(&mut doc.chapters, id) > 0,
        ActionType::RemoveHistory => match doc.history_by_id(id).map(|h| h.manga_id) {
            Some(manga_id) => {
                remove_by_id(&mut doc.history, id);
                doc.remove_manga_cascade(manga_id);
                true
            }
            None => false,
        },
        ActionType::RemoveExtension => remove_by_id(&mut doc.extensions, id) > 0,
        ActionType::RemoveTrack => remove_by_id(&mut doc.tracks, id) > 0,
        other => {
            warn!(action = %other, "not a remove action");
            false
        }
    }
}

fn clear(doc: &mut BackupDocument, action: ActionType) {
    match action {
        ActionType::ClearHistory => doc.history.clear(),
        ActionType::ClearUpdates => doc.updates.clear(),
        ActionType::ClearExtension => {
            doc.extensions.clear();
            doc.extensions_preferences.clear();
        }
        other => warn!(action = %other, "not a clear action"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfsync_model::{Field, LooseNumber};
    use shelfsync_storage::MemoryChangeLog;
    use uuid::Uuid;

    fn manga(id: EntityId, name: &str) -> Manga {
        Manga {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    fn chapter(id: EntityId, manga_id: EntityId) -> Chapter {
        Chapter {
            id,
            manga_id,
            name: format!("Ch. {id}").into(),
            ..Default::default()
        }
    }

    fn record<T: serde::Serialize>(
        action: ActionType,
        id: Option<EntityId>,
        entity: &T,
        client_date: i64,
    ) -> ChangeRecord {
        ChangeRecord::with_entity(action, id, entity, client_date).unwrap()
    }

    fn bare(action: ActionType, id: Option<EntityId>, client_date: i64) -> ChangeRecord {
        ChangeRecord::new(action, id, "", client_date)
    }

    fn sample() -> BackupDocument {
        let mut doc = BackupDocument::empty();
        doc.manga = vec![manga(5, "Blame!"), manga(6, "Biomega")];
        doc.chapters = vec![chapter(50, 5), chapter(51, 5), chapter(60, 6)];
        doc.history = vec![History {
            id: 70,
            manga_id: 6,
            date: LooseNumber::Int(1).into(),
            ..Default::default()
        }];
        doc.updates = vec![FeedUpdate {
            id: 80,
            manga_id: 5,
            chapter_name: "Ch. 51".into(),
            ..Default::default()
        }];
        doc.tracks = vec![Track {
            id: 90,
            manga_id: 5,
            ..Default::default()
        }];
        doc
    }

    fn run(
        doc: &mut BackupDocument,
        records: &[ChangeRecord],
        log: &mut MemoryChangeLog,
    ) -> PatchReport {
        PatchProcessor::default().apply(doc, records, log).unwrap()
    }

    #[test]
    fn remove_item_cascades() {
        let mut doc = sample();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        let report = run(&mut doc, &[bare(ActionType::RemoveItem, Some(5), 1000)], &mut log);

        assert_eq!(report.applied, 1);
        assert!(doc.manga_by_id(5).is_none());
        assert!(doc.chapters.iter().all(|c| c.manga_id != 5));
        assert!(doc.updates.is_empty());
        assert!(doc.tracks.is_empty());
        assert_eq!(doc.chapters.len(), 1);
    }

    #[test]
    fn remove_history_removes_its_manga() {
        let mut doc = sample();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        run(&mut doc, &[bare(ActionType::RemoveHistory, Some(70), 1)], &mut log);

        assert!(doc.history.is_empty());
        assert!(doc.manga_by_id(6).is_none());
        assert!(doc.chapter_by_id(60).is_none());
        assert!(doc.manga_by_id(5).is_some());
    }

    #[test]
    fn bad_record_does_not_abort_batch() {
        let mut doc = sample();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        let records = vec![
            record(ActionType::AddItem, None, &manga(7, "Knights of Sidonia"), 1),
            ChangeRecord::new(ActionType::AddChapter, None, "{not json", 2),
            record(ActionType::AddChapter, None, &chapter(71, 7), 3),
        ];
        let report = run(&mut doc, &records, &mut log);

        assert_eq!(report.applied, 2);
        assert_eq!(report.invalid, 1);
        assert!(doc.manga_by_id(7).is_some());
        assert!(doc.chapter_by_id(71).is_some());
    }

    #[test]
    fn unknown_and_incomplete_records_are_skipped() {
        let mut doc = sample();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        let records = vec![
            ChangeRecord {
                action: "ADD_SNAPSHOT".into(),
                isar_id: None,
                data: String::new(),
                client_date: 1,
            },
            bare(ActionType::RemoveChapter, None, 2),
            record(ActionType::UpdateItem, None, &manga(5, "x"), 3),
        ];
        let before = doc.clone();
        let report = run(&mut doc, &records, &mut log);

        assert_eq!(report.unknown, 1);
        assert_eq!(report.invalid, 2);
        assert_eq!(report.skipped(), 3);
        assert_eq!(doc, before);
        assert!(log.entries().is_empty());
    }

    #[test]
    fn records_apply_in_client_date_order() {
        let mut doc = sample();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        let records = vec![
            bare(ActionType::RemoveChapter, Some(90), 20),
            record(ActionType::AddChapter, None, &chapter(90, 5), 10),
        ];
        run(&mut doc, &records, &mut log);
        assert!(doc.chapter_by_id(90).is_none());
    }

    #[test]
    fn update_overwrites_and_logs() {
        let mut doc = sample();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        let renamed = manga(5, "BLAME!");
        run(&mut doc, &[record(ActionType::UpdateItem, Some(5), &renamed, 100)], &mut log);

        assert_eq!(doc.manga_by_id(5).unwrap().name.as_str(), "BLAME!");
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].action_type, "UPDATE_ITEM");
        assert_eq!(log.entries()[0].isar_id, Some(5));
    }

    #[test]
    fn stale_update_is_dropped_across_batches() {
        let mut doc = sample();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        let newer = record(ActionType::UpdateItem, Some(5), &manga(5, "T2"), 200);
        let older = record(ActionType::UpdateItem, Some(5), &manga(5, "T1"), 100);
        run(&mut doc, &[newer], &mut log);
        let report = run(&mut doc, &[older], &mut log);

        assert_eq!(report.stale, 1);
        assert_eq!(doc.manga_by_id(5).unwrap().name.as_str(), "T2");
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn equal_client_date_is_accepted() {
        let mut doc = sample();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        run(&mut doc, &[record(ActionType::UpdateItem, Some(5), &manga(5, "a"), 100)], &mut log);
        run(&mut doc, &[record(ActionType::UpdateItem, Some(5), &manga(5, "b"), 100)], &mut log);
        assert_eq!(doc.manga_by_id(5).unwrap().name.as_str(), "b");
    }

    #[test]
    fn update_of_missing_entity_is_logged_no_op() {
        let mut doc = sample();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        let update = record(ActionType::UpdateChapter, Some(999), &chapter(999, 5), 1);
        let report = run(&mut doc, &[update], &mut log);

        assert_eq!(report.missing, 1);
        assert!(doc.chapter_by_id(999).is_none());
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn update_keeps_slot_id() {
        let mut doc = sample();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        let mut payload = chapter(12345, 5);
        payload.is_read = true.into();
        run(&mut doc, &[record(ActionType::UpdateChapter, Some(50), &payload, 1)], &mut log);

        let updated = doc.chapter_by_id(50).unwrap();
        assert!(updated.is_read.or_default());
        assert!(doc.chapter_by_id(12345).is_none());
    }

    #[test]
    fn clear_extension_also_clears_preferences() {
        let mut doc = sample();
        doc.extensions.push(Extension {
            id: 1,
            ..Default::default()
        });
        doc.extensions_preferences.push(serde_json::json!({"k": 1}));
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        let records = [
            bare(ActionType::ClearExtension, None, 1),
            bare(ActionType::ClearUpdates, None, 2),
        ];
        run(&mut doc, &records, &mut log);

        assert!(doc.extensions.is_empty());
        assert!(doc.extensions_preferences.is_empty());
        assert!(doc.updates.is_empty());
        assert_eq!(doc.history.len(), 1);
    }

    #[test]
    fn remove_category_strips_membership() {
        let mut doc = sample();
        doc.categories.push(Category {
            id: 3,
            ..Default::default()
        });
        doc.manga[0].categories = vec![3, 4].into();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        run(&mut doc, &[bare(ActionType::RemoveCategory, Some(3), 1)], &mut log);

        assert!(doc.categories.is_empty());
        assert_eq!(doc.manga[0].categories, Field::from(vec![4]));
    }

    #[test]
    fn added_orphans_are_pruned() {
        let mut doc = sample();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        let orphan = record(ActionType::AddChapter, None, &chapter(99, 404), 1);
        let report = run(&mut doc, &[orphan], &mut log);

        assert_eq!(report.applied, 1);
        assert_eq!(report.orphans_pruned, 1);
        assert!(doc.chapter_by_id(99).is_none());
    }

    #[test]
    fn unsupported_version_is_untouched() {
        let mut doc = sample();
        doc.version = "7".into();
        let before = doc.clone();
        let mut log = MemoryChangeLog::new(Uuid::new_v4());
        let report = run(&mut doc, &[bare(ActionType::RemoveItem, Some(5), 1)], &mut log);

        assert!(report.version_skipped);
        assert_eq!(doc, before);
    }
}
