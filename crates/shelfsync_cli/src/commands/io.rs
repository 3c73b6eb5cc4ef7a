//! File helpers shared by the commands.

use shelfsync_model::BackupDocument;
use shelfsync_storage::{BackupStore, FileBackend, StorageBackend};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors raised while reading command inputs.
#[derive(Error, Debug)]
pub enum InputError {
    /// A file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file is not valid JSON of the expected shape.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Reads a file to a string.
pub fn read_text(path: &Path) -> Result<String, InputError> {
    fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Reads and parses a backup document.
pub fn read_document(path: &Path) -> Result<BackupDocument, Box<dyn std::error::Error>> {
    let text = read_text(path)?;
    Ok(BackupDocument::from_json(&text)?)
}

/// Reads and decodes a JSON file.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|source| InputError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Writes `text` to `output`, or to stdout if none is given.
pub fn write_output(output: Option<&Path>, text: &str) -> std::io::Result<()> {
    match output {
        Some(path) => fs::write(path, text),
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

/// Opens a file-backed store.
pub fn open_store(data_dir: &Path) -> Result<BackupStore, Box<dyn std::error::Error>> {
    let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::open(data_dir)?);
    Ok(BackupStore::new(backend))
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_names_path() {
        let err = read_text(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.json"));
    }

    #[test]
    fn parse_error_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{").unwrap();
        let err = read_json::<serde_json::Value>(&path).unwrap_err();
        assert!(matches!(err, InputError::Parse { .. }));
    }

    #[test]
    fn writes_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_output(Some(&path), "{}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }
}
