//! # Shelfsync Server
//!
//! Transport-free request handlers for the backup server.
//!
//! This crate provides:
//! - Fingerprint checks of the stored document
//! - Incremental sync (patch replay) and bulk merge
//! - Full upload and download
//! - Change log retention
//!
//! # Architecture
//!
//! Every mutating request runs inside one per-user transaction of a
//! [`BackupStore`](shelfsync_storage::BackupStore): the document is read,
//! reconciled in memory, and written back together with any new change
//! log rows. A failure anywhere rolls everything back.
//!
//! HTTP routing, authentication and status-code mapping belong to the
//! embedding service; [`ServerError::is_client_error`] tells it which
//! failures were caused by the request.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler, RequestStats};
pub use server::SyncServer;
