//! Stress tests for the sync server.
//!
//! These exercise the server under heavy load and concurrent access from
//! several devices of one user.

use crate::fixtures::{rename_record, scenarios};
use shelfsync_model::{Chapter, EntityId};
use shelfsync_protocol::{
    ActionType, BackupPayload, ChangeRecord, ChangedItems, MergeRequest, SyncRequest,
    UploadRequest,
};
use shelfsync_server::SyncServer;
use shelfsync_storage::UserId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of requests to send.
    pub operations: usize,
    /// Number of concurrent devices (threads).
    pub threads: usize,
    /// Records per sync batch.
    pub batch_size: usize,
    /// Manga in the seeded library.
    pub manga_count: i64,
    /// Chapters per seeded manga.
    pub chapters_per_manga: i64,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 1_000,
            threads: 4,
            batch_size: 10,
            manga_count: 50,
            chapters_per_manga: 20,
        }
    }
}

impl StressConfig {
    /// A configuration small enough for unit tests.
    pub fn quick() -> Self {
        Self {
            operations: 40,
            threads: 4,
            batch_size: 5,
            manga_count: 5,
            chapters_per_manga: 4,
        }
    }
}

fn seed(server: &SyncServer, user: UserId, config: &StressConfig) {
    let doc = scenarios::library(config.manga_count, config.chapters_per_manga);
    let backup_data = BackupPayload::document(&doc).expect("Failed to encode library");
    server
        .upload_full(user, &UploadRequest { backup_data })
        .expect("Failed to seed library");
}

fn read_batch(config: &StressConfig, op: usize) -> Vec<ChangeRecord> {
    let manga_count = config.manga_count.max(1);
    let chapters = config.chapters_per_manga.max(1);
    (0..config.batch_size)
        .map(|n| {
            let slot = op * config.batch_size + n;
            let manga_id = (slot as EntityId % manga_count) + 1;
            let chapter = (slot as EntityId / manga_count) % chapters;
            let id = manga_id * 1_000 + chapter;
            let entity = Chapter {
                id,
                manga_id,
                name: format!("Ch. {chapter}").into(),
                is_read: true.into(),
                ..Default::default()
            };
            ChangeRecord::with_entity(ActionType::UpdateChapter, Some(id), &entity, slot as i64)
                .expect("Failed to encode chapter")
        })
        .collect()
}

/// Run sequential incremental syncs against one user.
pub fn stress_sequential_syncs(server: &SyncServer, config: &StressConfig) -> StressTestResult {
    let user = UserId::new_v4();
    seed(server, user, config);

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for op in 0..config.operations {
        let request = SyncRequest::new(read_batch(config, op));
        match server.sync(user, &request) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run incremental syncs for one user from several devices at once.
pub fn stress_concurrent_syncs(server: Arc<SyncServer>, config: &StressConfig) -> StressTestResult {
    let user = UserId::new_v4();
    seed(&server, user, config);

    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);

    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let server = Arc::clone(&server);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();

            thread::spawn(move || {
                for i in 0..ops_per_thread {
                    let op = t * ops_per_thread + i;
                    let mut batch = read_batch(&config, op);
                    batch.push(rename_record(1, &format!("device {t}"), op as i64));
                    match server.sync(user, &SyncRequest::new(batch)) {
                        Ok(_) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Run repeated full merges of a diverging client copy.
pub fn stress_merges(server: &SyncServer, config: &StressConfig) -> StressTestResult {
    let user = UserId::new_v4();
    let (base, ahead) = scenarios::diverged(config.manga_count);
    let initial = MergeRequest {
        backup_data: BackupPayload::document(&base).expect("Failed to encode library"),
        changed_items: ChangedItems::default(),
    };
    server.merge(user, &initial).expect("Failed to seed library");
    let request = MergeRequest {
        backup_data: BackupPayload::document(&ahead).expect("Failed to encode library"),
        changed_items: ChangedItems::default(),
    };

    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for _ in 0..config.operations {
        match server.merge(user, &request) {
            Ok(_) => successful += 1,
            Err(_) => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfsync_server::ServerConfig;

    #[test]
    fn sequential_syncs_succeed() {
        let server = SyncServer::new(ServerConfig::default());
        let result = stress_sequential_syncs(&server, &StressConfig::quick());
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 40);
    }

    #[test]
    fn concurrent_syncs_succeed() {
        let server = Arc::new(SyncServer::new(ServerConfig::default()));
        let result = stress_concurrent_syncs(Arc::clone(&server), &StressConfig::quick());
        assert_eq!(result.failed_ops, 0);
        assert_eq!(server.stats().syncs, 40);
    }

    #[test]
    fn merges_succeed() {
        let server = SyncServer::new(ServerConfig::default());
        let mut config = StressConfig::quick();
        config.operations = 5;
        let result = stress_merges(&server, &config);
        assert_eq!(result.successful_ops, 5);
    }

    #[test]
    fn empty_library_is_stressed_without_panicking() {
        let server = SyncServer::new(ServerConfig::default());
        let config = StressConfig {
            manga_count: 0,
            chapters_per_manga: 0,
            ..StressConfig::quick()
        };
        let result = stress_sequential_syncs(&server, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 40);

        let result = stress_merges(&server, &config);
        assert_eq!(result.failed_ops, 0);
    }
}
