use crate::{
    document::Document,
    error::{Error, Result},
};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, info};

/// Writes annotated documents as a JSON array of
/// `{ "page_content", "metadata" }` objects.
#[derive(Debug, Clone)]
pub struct Writer {
    backup_existing: bool,
    pretty: bool,
}

impl Default for Writer {
    fn default() -> Self {
        Self {
            backup_existing: false,
            pretty: true,
        }
    }
}

impl Writer {
    /// Creates a writer producing pretty JSON without backups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies an existing output file aside before replacing it.
    #[must_use]
    pub const fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = enabled;
        self
    }

    /// Chooses between indented and compact JSON.
    #[must_use]
    pub const fn pretty(mut self, enabled: bool) -> Self {
        self.pretty = enabled;
        self
    }

    /// Serializes documents to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if a metadata value cannot be encoded.
    pub fn to_json(&self, documents: &[Document]) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(documents)?
        } else {
            serde_json::to_string(documents)?
        };
        Ok(json)
    }

    /// Writes documents to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any file operation fails.
    pub fn write_documents(&self, path: &Path, documents: &[Document]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let mut content = self.to_json(documents)?;
        content.push('\n');

        self.write_file_atomic(path, &content)?;

        info!("Wrote {} documents to {}", documents.len(), path.display());
        Ok(())
    }

    /// Writes through a temporary sibling file renamed over the target, so
    /// an interrupted write never leaves a truncated output.
    fn write_file_atomic(&self, path: &Path, content: &str) -> Result<()> {
        if path.exists() && self.backup_existing {
            backup_file(path)?;
        }

        let temp_path = temp_path(path)?;

        let written = fs::File::create(&temp_path).and_then(|mut temp_file| {
            temp_file.write_all(content.as_bytes())?;
            temp_file.sync_all()
        });

        if let Err(e) = written.and_then(|()| fs::rename(&temp_path, path)) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                debug!("Could not remove {}: {}", temp_path.display(), cleanup);
            }
            return Err(Error::io(path, e));
        }

        Ok(())
    }
}

/// Reads documents previously written by [`Writer`].
///
/// # Errors
///
/// Returns an IO error if the file cannot be read and a serialization
/// error if it is not a document array.
pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

/// Sibling `<name>.tmp` path used while writing `path`.
fn temp_path(path: &Path) -> Result<PathBuf> {
    let filename = path
        .file_name()
        .ok_or_else(|| Error::config("Invalid output path"))?
        .to_string_lossy();

    Ok(path.with_file_name(format!("{filename}.tmp")))
}

/// Creates a timestamped copy of an existing file.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());

    let filename = path
        .file_name()
        .ok_or_else(|| Error::config("Invalid output path"))?
        .to_string_lossy();

    let backup_path = path.with_file_name(format!("{filename}.backup.{timestamp}"));

    fs::copy(path, &backup_path).map_err(|e| Error::io(&backup_path, e))?;

    debug!("Created backup: {}", backup_path.display());
    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn annotated() -> Vec<Document> {
        let mut document = Document::new("Lions live in prides.").meta("source", "lion.txt");
        document.set_topics(&["Social structure".to_string(), "Lions".to_string()]);
        vec![document]
    }

    #[test]
    fn test_json_shape() {
        let json = Writer::new().pretty(false).to_json(&annotated()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["page_content"], "Lions live in prides.");
        assert_eq!(value[0]["metadata"]["topics"][1], "Lions");
        assert_eq!(value[0]["metadata"]["source"], "lion.txt");
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output = temp.child("out/nested/topics.json");

        Writer::new().write_documents(output.path(), &annotated()).unwrap();

        let content = fs::read_to_string(output.path()).unwrap();
        assert!(content.contains("\"Social structure\""));
        assert!(content.ends_with("]\n"));
        assert!(!temp.child("out/nested/topics.json.tmp").exists());
    }

    #[test]
    fn test_written_file_reads_back() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output = temp.child("topics.json");
        let documents = annotated();

        Writer::new().write_documents(output.path(), &documents).unwrap();
        assert_eq!(read_documents(output.path()).unwrap(), documents);
    }

    #[test]
    fn test_backup_existing() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output = temp.child("topics.json");
        output.write_str("[]").unwrap();

        Writer::new()
            .backup_existing(true)
            .write_documents(output.path(), &annotated())
            .unwrap();

        let entries: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();

        assert!(entries.iter().any(|name| name.starts_with("topics.json.backup.")));
    }

    #[test]
    fn test_no_backup_by_default() {
        let temp = assert_fs::TempDir::new().unwrap();
        let output = temp.child("topics.json");
        output.write_str("[]").unwrap();

        Writer::new().write_documents(output.path(), &annotated()).unwrap();

        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_unrelated_tmp_file_is_untouched() {
        let temp = assert_fs::TempDir::new().unwrap();
        let unrelated = temp.child("topics.tmp");
        unrelated.write_str("keep me").unwrap();
        let output = temp.child("topics.json");

        Writer::new().write_documents(output.path(), &annotated()).unwrap();

        assert_eq!(fs::read_to_string(unrelated.path()).unwrap(), "keep me");
        assert!(!temp.child("topics.json.tmp").exists());
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        // A directory at the target makes the final rename fail.
        let output = temp.child("topics.json");
        output.create_dir_all().unwrap();
        output.child("inner").write_str("x").unwrap();

        let err = Writer::new()
            .write_documents(output.path(), &annotated())
            .unwrap_err();

        assert!(err.is_io());
        assert!(!temp.child("topics.json.tmp").exists());
    }

    #[test]
    fn test_read_invalid_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("bad.json");
        file.write_str("{ not json").unwrap();

        assert!(matches!(
            read_documents(file.path()),
            Err(Error::Serialization { .. })
        ));
        assert!(read_documents(Path::new("/nonexistent/topics.json")).unwrap_err().is_io());
    }
}
