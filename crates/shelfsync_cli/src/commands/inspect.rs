//! Inspect command implementation.

use super::io;
use serde::Serialize;
use shelfsync_model::{DocumentStats, Fingerprint, OrphanRef};
use std::path::Path;

/// Document inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Document path.
    pub path: String,
    /// Hex fingerprint.
    pub fingerprint: String,
    /// Whether the version has merge and patch rules.
    pub supported_version: bool,
    /// Collection counts.
    pub stats: DocumentStats,
    /// Children whose manga is missing.
    pub orphans: Vec<OrphanRef>,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let doc = io::read_document(path)?;
    let result = InspectResult {
        path: path.display().to_string(),
        fingerprint: Fingerprint::of(&doc)?.to_hex(),
        supported_version: doc.is_supported_version(),
        stats: doc.stats(),
        orphans: doc.orphans(),
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    let stats = &result.stats;
    println!("Backup Document Inspection");
    println!("==========================");
    println!();
    println!("Path:        {}", result.path);
    println!("Fingerprint: {}", result.fingerprint);
    println!(
        "Version:     {}{}",
        stats.version,
        if result.supported_version { "" } else { " (unsupported)" }
    );
    println!();
    println!("Collections:");
    println!("  Manga:       {}", stats.manga);
    println!("  Categories:  {}", stats.categories);
    println!("  Chapters:    {}", stats.chapters);
    println!("  History:     {}", stats.history);
    println!("  Updates:     {}", stats.updates);
    println!("  Tracks:      {}", stats.tracks);
    println!("  Extensions:  {}", stats.extensions);
    println!("  Settings:    {}", stats.settings);
    println!("  Downloads:   {}", stats.downloads);

    if !result.orphans.is_empty() {
        println!();
        println!("Orphans ({}):", result.orphans.len());
        for orphan in &result.orphans {
            println!(
                "  {} #{} -> missing manga {}",
                orphan.collection.as_str(),
                orphan.id,
                orphan.manga_id
            );
        }
    }
}
