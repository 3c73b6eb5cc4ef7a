//! Patch command implementation.

use super::io;
use serde::Deserialize;
use shelfsync_engine::{EngineError, PatchProcessor, PatchReport};
use shelfsync_model::BackupDocument;
use shelfsync_protocol::{ChangeRecord, SyncRequest};
use shelfsync_storage::{MemoryChangeLog, UserId};
use std::path::Path;
use tracing::info;

/// A changes file: a sync request body or a bare record array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChangesFile {
    /// `{"changedParts": [...]}`
    Request(SyncRequest),
    /// `[...]`
    Records(Vec<ChangeRecord>),
}

impl ChangesFile {
    /// Returns the records.
    pub fn into_records(self) -> Vec<ChangeRecord> {
        match self {
            ChangesFile::Request(request) => request.changed_parts,
            ChangesFile::Records(records) => records,
        }
    }
}

/// Where update arbitration history comes from.
pub enum LogSource<'a> {
    /// A fresh in-memory log.
    Memory,
    /// The persisted change log of `user` in `data_dir`.
    Store {
        /// Data directory.
        data_dir: &'a Path,
        /// User whose log is consulted and extended.
        user: UserId,
    },
}

/// Applies a changes file to a document and writes the result.
pub fn run(
    doc: &Path,
    changes: &Path,
    log: LogSource<'_>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut document = io::read_document(doc)?;
    let records = io::read_json::<ChangesFile>(changes)?.into_records();

    let report = apply(&mut document, &records, log)?;
    info!(
        applied = report.applied,
        stale = report.stale,
        missing = report.missing,
        invalid = report.invalid,
        unknown = report.unknown,
        "patch applied"
    );
    io::write_output(output, &document.to_json()?)?;
    Ok(())
}

fn apply(
    document: &mut BackupDocument,
    records: &[ChangeRecord],
    log: LogSource<'_>,
) -> Result<PatchReport, Box<dyn std::error::Error>> {
    let processor = PatchProcessor::default();
    match log {
        LogSource::Memory => {
            let mut log = MemoryChangeLog::new(UserId::nil());
            Ok(processor.apply(document, records, &mut log)?)
        }
        LogSource::Store { data_dir, user } => {
            let store = io::open_store(data_dir)?;
            let report = store.transaction::<_, _, EngineError>(user, |txn| {
                processor.apply(document, records, txn)
            })?;
            Ok(report)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfsync_model::Manga;
    use shelfsync_protocol::ActionType;

    fn sample() -> BackupDocument {
        let mut doc = BackupDocument::empty();
        doc.manga.push(Manga {
            id: 1,
            ..Default::default()
        });
        doc
    }

    fn rename(name: &str, date: i64) -> ChangeRecord {
        let manga = Manga {
            id: 1,
            name: name.into(),
            ..Default::default()
        };
        ChangeRecord::with_entity(ActionType::UpdateItem, Some(1), &manga, date).unwrap()
    }

    #[test]
    fn changes_file_accepts_both_shapes() {
        let wrapped: ChangesFile =
            serde_json::from_str(r#"{"changedParts":[{"action":"CLEAR_HISTORY","clientDate":1}]}"#)
                .unwrap();
        assert_eq!(wrapped.into_records().len(), 1);

        let bare: ChangesFile =
            serde_json::from_str(r#"[{"action":"CLEAR_UPDATES","clientDate":1}]"#).unwrap();
        assert_eq!(bare.into_records()[0].action, "CLEAR_UPDATES");
    }

    #[test]
    fn persisted_log_arbitrates_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let user = uuid::Uuid::new_v4();
        let store = || LogSource::Store {
            data_dir: dir.path(),
            user,
        };

        let mut doc = sample();
        apply(&mut doc, &[rename("newer", 200)], store()).unwrap();

        let mut doc = sample();
        let report = apply(&mut doc, &[rename("older", 100)], store()).unwrap();
        assert_eq!(report.stale, 1);
        assert_eq!(doc.manga[0].name.as_str(), "");
    }

    #[test]
    fn memory_log_starts_empty() {
        let mut doc = sample();
        let report = apply(&mut doc, &[rename("x", 1)], LogSource::Memory).unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(doc.manga[0].name.as_str(), "x");
    }
}
