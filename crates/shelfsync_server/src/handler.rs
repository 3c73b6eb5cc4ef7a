//! Request handlers for the backup endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use parking_lot::Mutex;
use shelfsync_engine::{merge_backups, PatchProcessor};
use shelfsync_model::{BackupDocument, Fingerprint};
use shelfsync_protocol::{BackupResponse, HashResponse, MergeRequest, SyncRequest, UploadRequest};
use shelfsync_storage::{BackupStore, UserId, UserTransaction};
use std::sync::Arc;
use tracing::{error, info};

/// Counters over handled requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestStats {
    /// Incremental syncs committed.
    pub syncs: u64,
    /// Merges committed.
    pub merges: u64,
    /// Full uploads committed.
    pub uploads: u64,
    /// Change records applied across all syncs.
    pub records_applied: u64,
    /// Change records skipped across all syncs.
    pub records_skipped: u64,
    /// Requests that failed.
    pub failures: u64,
}

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Per-user documents and change logs.
    pub store: BackupStore,
    stats: Mutex<RequestStats>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: BackupStore) -> Self {
        Self {
            config,
            store,
            stats: Mutex::new(RequestStats::default()),
        }
    }

    /// Returns a snapshot of the request counters.
    pub fn stats(&self) -> RequestStats {
        *self.stats.lock()
    }

    fn record<T>(&self, result: &ServerResult<T>, update: impl FnOnce(&mut RequestStats, &T)) {
        let mut stats = self.stats.lock();
        match result {
            Ok(value) => update(&mut stats, value),
            Err(_) => stats.failures += 1,
        }
    }
}

/// Parses the stored document of a transaction, if any.
fn load(txn: &UserTransaction<'_>) -> ServerResult<Option<BackupDocument>> {
    match txn.document() {
        Some(text) if !text.trim().is_empty() => Ok(Some(BackupDocument::from_json(text)?)),
        _ => Ok(None),
    }
}

/// Handler for backup requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Creates the empty version `"1"` document if the user has none.
    ///
    /// Returns true if a document was created.
    pub fn handle_initialize(&self, user: UserId) -> ServerResult<bool> {
        self.context.store.transaction(user, |txn| {
            if txn.document().is_some() {
                return Ok(false);
            }
            txn.set_document(BackupDocument::empty().to_json()?);
            info!(%user, "initialized empty document");
            Ok(true)
        })
    }

    /// Fingerprints the stored document.
    pub fn handle_check(&self, user: UserId) -> ServerResult<HashResponse> {
        let text = self.context.store.read_document(user)?;
        let hash = Fingerprint::of_stored(text.as_deref())?.to_hex();
        Ok(HashResponse { hash })
    }

    /// Replays an incremental batch and returns the new fingerprint.
    pub fn handle_sync(&self, user: UserId, request: &SyncRequest) -> ServerResult<HashResponse> {
        let config = &self.context.config;
        request.validate(config.max_batch_size, config.max_action_len)?;

        let processor = PatchProcessor::new(config.patch.clone());
        let result: ServerResult<_> = self.context.store.transaction(user, |txn| {
            let mut doc = load(txn)?.ok_or(ServerError::NoRemoteData)?;
            let report = processor.apply(&mut doc, &request.changed_parts, txn)?;
            txn.set_document(doc.to_json()?);
            let hash = Fingerprint::of(&doc)?.to_hex();
            Ok((report, hash))
        });
        self.context.record(&result, |stats, (report, _)| {
            stats.syncs += 1;
            stats.records_applied += report.applied as u64;
            stats.records_skipped += report.skipped() as u64;
        });

        let (report, hash) = result.inspect_err(|err| {
            if err.is_server_error() {
                error!(%user, %err, "sync rolled back");
            }
        })?;
        info!(
            %user,
            applied = report.applied,
            skipped = report.skipped(),
            %hash,
            "sync committed"
        );

        if let Some(window) = config.timeline_retention {
            if let Some(newest) = request.changed_parts.iter().map(|r| r.client_date).max() {
                let removed = self
                    .context
                    .store
                    .prune_timeline(user, newest.saturating_sub(window))?;
                if removed > 0 {
                    info!(%user, removed, "change log pruned");
                }
            }
        }
        Ok(HashResponse { hash })
    }

    /// Merges a full client document into the stored one.
    ///
    /// With no stored document the submitted one is stored as is.
    pub fn handle_merge(
        &self,
        user: UserId,
        request: &MergeRequest,
    ) -> ServerResult<BackupResponse> {
        let incoming = request.backup_data.parse()?;
        let options = &self.context.config.merge;

        let result: ServerResult<String> = self.context.store.transaction(user, |txn| {
            let Some(stored) = load(txn)? else {
                let text = incoming.to_json()?;
                txn.set_document(text.clone());
                info!(%user, "no stored document, keeping submitted one");
                return Ok(text);
            };
            let outcome = merge_backups(&stored, &incoming, &request.changed_items, options);
            if !outcome.is_merged() {
                return Ok(txn.document().unwrap_or_default().to_string());
            }
            let text = outcome.document.to_json()?;
            txn.set_document(text.clone());
            info!(
                %user,
                manga = outcome.document.manga.len(),
                deleted = outcome.stats.manga_deleted,
                "merge committed"
            );
            Ok(text)
        });
        self.context.record(&result, |stats, _| stats.merges += 1);

        let backup_data = result.inspect_err(|err| {
            if err.is_server_error() {
                error!(%user, %err, "merge rolled back");
            }
        })?;
        Ok(BackupResponse { backup_data })
    }

    /// Replaces the stored document wholesale.
    pub fn handle_upload(
        &self,
        user: UserId,
        request: &UploadRequest,
    ) -> ServerResult<BackupResponse> {
        let doc = request.backup_data.parse()?;
        let text = doc.to_json()?;
        let result: ServerResult<()> = self.context.store.transaction(user, |txn| {
            txn.set_document(text.clone());
            Ok(())
        });
        self.context.record(&result, |stats, _| stats.uploads += 1);
        result?;
        info!(%user, manga = doc.manga.len(), "full upload stored");
        Ok(BackupResponse { backup_data: text })
    }

    /// Returns the stored document text.
    pub fn handle_download(&self, user: UserId) -> ServerResult<BackupResponse> {
        match self.context.store.read_document(user)? {
            Some(backup_data) => Ok(BackupResponse { backup_data }),
            None => Err(ServerError::NoRemoteData),
        }
    }

    /// Drops change log entries with `clientDate < before`.
    pub fn handle_prune_timeline(&self, user: UserId, before: i64) -> ServerResult<usize> {
        let removed = self.context.store.prune_timeline(user, before)?;
        info!(%user, before, removed, "change log pruned");
        Ok(removed)
    }
}
