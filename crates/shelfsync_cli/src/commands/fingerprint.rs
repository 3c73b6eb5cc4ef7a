//! Fingerprint command implementation.

use super::io;
use shelfsync_model::Fingerprint;
use std::path::Path;

/// Prints the fingerprint of a document file.
///
/// A blank file hashes as an absent document.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let text = io::read_text(path)?;
    let fingerprint = Fingerprint::of_stored(Some(&text))?;
    println!("{fingerprint}");
    Ok(())
}
