//! Kotatsu import command implementation.

use super::io;
use shelfsync_engine::{import_kotatsu, KotatsuBackup};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Converts an unpacked Kotatsu backup directory into a document.
///
/// Every regular file in `dir` is an archive entry named after the file.
pub fn run(dir: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let entries = read_entries(dir)?;
    info!(entries = entries.len(), "read kotatsu backup");

    let backup = KotatsuBackup::from_entries(entries)?;
    let doc = import_kotatsu(&backup, io::now_millis());
    io::write_output(output, &doc.to_json()?)?;
    Ok(())
}

fn read_entries(dir: &Path) -> Result<Vec<(String, String)>, Box<dyn std::error::Error>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Ok(contents) = fs::read_to_string(entry.path()) else {
            debug!(entry = %name, "skipping non-text entry");
            continue;
        };
        entries.push((name, contents));
    }
    entries.sort();
    Ok(entries)
}
