//! Server configuration.

use shelfsync_engine::{MergeOptions, PatchOptions};
use shelfsync_protocol::{DEFAULT_MAX_ACTION_LEN, DEFAULT_MAX_BATCH_SIZE};

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum records in one incremental sync batch.
    pub max_batch_size: usize,
    /// Maximum length of an action name.
    pub max_action_len: usize,
    /// Change log retention window in milliseconds of client time.
    ///
    /// After each sync, entries older than the newest record of the batch
    /// minus this window are removed. `None` keeps the log forever.
    pub timeline_retention: Option<i64>,
    /// Merge configuration.
    pub merge: MergeOptions,
    /// Patch configuration.
    pub patch: PatchOptions,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_action_len: DEFAULT_MAX_ACTION_LEN,
            timeline_retention: None,
            merge: MergeOptions::default(),
            patch: PatchOptions::default(),
        }
    }

    /// Sets the maximum batch size.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Sets the maximum action name length.
    pub fn with_max_action_len(mut self, len: usize) -> Self {
        self.max_action_len = len;
        self
    }

    /// Enables change log retention with the given window (ms).
    pub fn with_timeline_retention(mut self, window: i64) -> Self {
        self.timeline_retention = Some(window);
        self
    }

    /// Sets the merge options.
    pub fn with_merge_options(mut self, options: MergeOptions) -> Self {
        self.merge = options;
        self
    }

    /// Sets the patch options.
    pub fn with_patch_options(mut self, options: PatchOptions) -> Self {
        self.patch = options;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
