//! Change log commands.

use super::io;
use serde::Serialize;
use shelfsync_storage::{TimelineEntry, UserId};
use std::path::Path;

/// A change log row for output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRow<'a> {
    /// Action name.
    pub action_type: &'a str,
    /// Target id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isar_id: Option<i64>,
    /// Client timestamp (ms).
    pub client_date: i64,
    /// Payload size in bytes.
    pub payload_size: usize,
}

impl<'a> From<&'a TimelineEntry> for TimelineRow<'a> {
    fn from(entry: &'a TimelineEntry) -> Self {
        Self {
            action_type: &entry.action_type,
            isar_id: entry.isar_id,
            client_date: entry.client_date,
            payload_size: entry.backup_data.len(),
        }
    }
}

/// Lists the newest change log entries of a user.
pub fn list(
    data_dir: &Path,
    user: UserId,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = io::open_store(data_dir)?;
    let mut entries = store.timeline(user)?;
    entries.sort_by_key(|e| std::cmp::Reverse(e.client_date));
    entries.truncate(limit.unwrap_or(usize::MAX));
    let rows: Vec<TimelineRow<'_>> = entries.iter().map(TimelineRow::from).collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        _ => {
            if rows.is_empty() {
                println!("No change log entries for {user}");
            }
            for row in &rows {
                let id = row
                    .isar_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string());
                println!(
                    "{:>15}  {:<20} {:>10}  {} bytes",
                    row.client_date, row.action_type, id, row.payload_size
                );
            }
        }
    }
    Ok(())
}

/// Drops entries with `clientDate < before`.
pub fn prune(data_dir: &Path, user: UserId, before: i64) -> Result<(), Box<dyn std::error::Error>> {
    let store = io::open_store(data_dir)?;
    let removed = store.prune_timeline(user, before)?;
    println!("Removed {removed} change log entries");
    Ok(())
}
