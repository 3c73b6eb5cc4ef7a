//! Merge command implementation.

use super::io;
use shelfsync_engine::{merge_backups, MergeOptions};
use shelfsync_protocol::ChangedItems;
use std::path::Path;
use tracing::{info, warn};

/// Merges `new` into `old` and writes the result.
pub fn run(
    old: &Path,
    new: &Path,
    changes: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let old = io::read_document(old)?;
    let new = io::read_document(new)?;
    let changes: ChangedItems = match changes {
        Some(path) => io::read_json(path)?,
        None => ChangedItems::default(),
    };

    let outcome = merge_backups(&old, &new, &changes, &MergeOptions::default());
    match &outcome.skipped {
        Some(skip) => warn!(?skip, "documents not merged"),
        None => info!(stats = ?outcome.stats, "documents merged"),
    }
    io::write_output(output, &outcome.document.to_json()?)?;
    Ok(())
}
