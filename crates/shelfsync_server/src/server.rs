//! Main sync server.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{HandlerContext, RequestHandler, RequestStats};
use shelfsync_protocol::{
    BackupResponse, HashResponse, MergeRequest, ShelfMessage, ShelfReply, SyncRequest,
    UploadRequest,
};
use shelfsync_storage::{BackupStore, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

/// The sync server.
///
/// Binds the reconciliation engine to per-user storage. Transport and
/// authentication live outside: callers resolve the user and hand over
/// decoded requests.
///
/// # Example
///
/// ```
/// use shelfsync_protocol::{ShelfMessage, ShelfReply};
/// use shelfsync_server::{ServerConfig, SyncServer};
///
/// let server = SyncServer::new(ServerConfig::default());
/// let user = uuid::Uuid::new_v4();
///
/// assert_eq!(server.handle_message(user, ShelfMessage::Initialize), ShelfReply::Ack);
/// assert!(matches!(server.handle_message(user, ShelfMessage::Check), ShelfReply::Hash(_)));
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a server over in-memory storage.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, BackupStore::in_memory())
    }

    /// Creates a server over an existing store.
    pub fn with_store(config: ServerConfig, store: BackupStore) -> Self {
        let context = Arc::new(HandlerContext::new(config, store));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Creates the empty document on first login.
    pub fn initialize(&self, user: UserId) -> ServerResult<bool> {
        self.handler.handle_initialize(user)
    }

    /// Fingerprints the stored document.
    pub fn check(&self, user: UserId) -> ServerResult<HashResponse> {
        self.handler.handle_check(user)
    }

    /// Replays an incremental batch.
    pub fn sync(&self, user: UserId, request: &SyncRequest) -> ServerResult<HashResponse> {
        self.handler.handle_sync(user, request)
    }

    /// Merges a full client document.
    pub fn merge(&self, user: UserId, request: &MergeRequest) -> ServerResult<BackupResponse> {
        self.handler.handle_merge(user, request)
    }

    /// Replaces the stored document.
    pub fn upload_full(
        &self,
        user: UserId,
        request: &UploadRequest,
    ) -> ServerResult<BackupResponse> {
        self.handler.handle_upload(user, request)
    }

    /// Fetches the stored document.
    pub fn download(&self, user: UserId) -> ServerResult<BackupResponse> {
        self.handler.handle_download(user)
    }

    /// Drops change log entries older than `before`.
    pub fn prune_timeline(&self, user: UserId, before: i64) -> ServerResult<usize> {
        self.handler.handle_prune_timeline(user, before)
    }

    /// Handles a message (dispatches to the appropriate handler).
    ///
    /// Failures are folded into [`ShelfReply::Error`].
    pub fn handle_message(&self, user: UserId, message: ShelfMessage) -> ShelfReply {
        let name = message.name();
        debug!(%user, message = name, "handling message");
        let result = match message {
            ShelfMessage::Initialize => self.initialize(user).map(|_| ShelfReply::Ack),
            ShelfMessage::Check => self.check(user).map(ShelfReply::Hash),
            ShelfMessage::Sync(req) => self.sync(user, &req).map(ShelfReply::Hash),
            ShelfMessage::Merge(req) => self.merge(user, &req).map(ShelfReply::Backup),
            ShelfMessage::Upload(req) => self.upload_full(user, &req).map(ShelfReply::Backup),
            ShelfMessage::Download => self.download(user).map(ShelfReply::Backup),
            ShelfMessage::PruneTimeline { before } => self
                .prune_timeline(user, before)
                .map(|removed| ShelfReply::Pruned { removed }),
        };
        result.unwrap_or_else(|err| {
            warn!(%user, message = name, %err, "request failed");
            ShelfReply::Error(err.to_response())
        })
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &BackupStore {
        &self.context.store
    }

    /// Returns a snapshot of the request counters.
    pub fn stats(&self) -> RequestStats {
        self.context.stats()
    }
}
