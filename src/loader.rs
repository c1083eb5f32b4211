use crate::{
    document::Document,
    error::{Error, Result},
};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions picked up when loading a directory.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Metadata key holding the path a document was read from.
pub const SOURCE_KEY: &str = "source";

/// Loads plain-text files into [`Document`]s.
///
/// Files given explicitly are always read; directories are walked
/// recursively in file-name order and only files with a
/// [`TEXT_EXTENSIONS`] extension are kept. Binary-looking files and
/// non-UTF-8 files are skipped with a warning.
#[derive(Debug, Clone)]
pub struct Loader {
    extensions: Vec<String>,
    follow_links: bool,
}

impl Default for Loader {
    fn default() -> Self {
        Self {
            extensions: TEXT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            follow_links: false,
        }
    }
}

impl Loader {
    /// Creates a loader for `.txt` and `.md` files.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the extensions accepted in directories.
    #[must_use]
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Follows symbolic links while walking directories.
    #[must_use]
    pub const fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Loads every path, in order.
    ///
    /// # Errors
    ///
    /// Returns an IO error if a path does not exist or cannot be read.
    pub fn load<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Document>> {
        let mut documents = Vec::new();

        for path in paths {
            let path = path.as_ref();

            if path.is_dir() {
                for file in self.walk(path)? {
                    if let Some(document) = read_document(&file)? {
                        documents.push(document);
                    }
                }
            } else if path.is_file() {
                if let Some(document) = read_document(path)? {
                    documents.push(document);
                }
            } else {
                return Err(Error::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "Input path not found"),
                ));
            }
        }

        debug!("Loaded {} documents from {} paths", documents.len(), paths.len());
        Ok(documents)
    }

    fn walk(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                Error::io(path, std::io::Error::other(e.to_string()))
            })?;

            if entry.file_type().is_file() && self.accepts(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// Reads a single file, returning `None` for binary or non-UTF-8 content.
fn read_document(path: &Path) -> Result<Option<Document>> {
    if is_likely_binary(path)? {
        warn!("Skipping binary file: {}", path.display());
        return Ok(None);
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            warn!("Skipping non-UTF-8 file: {}", path.display());
            return Ok(None);
        }
        Err(e) => return Err(Error::io(path, e)),
    };

    Ok(Some(
        Document::new(content).meta(SOURCE_KEY, path.to_string_lossy().into_owned()),
    ))
}

/// Sniffs the first 8KB of a file: null bytes or a low share of ASCII
/// mean binary.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub(crate) fn is_likely_binary(path: &Path) -> Result<bool> {
    const BUFFER_SIZE: usize = 8192;
    const ASCII_THRESHOLD: f64 = 0.85;

    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = [0u8; BUFFER_SIZE];

    let bytes_read = reader.read(&mut buffer).map_err(|e| Error::io(path, e))?;

    if bytes_read == 0 {
        return Ok(false);
    }

    let sample = &buffer[..bytes_read];

    if memchr::memchr(0, sample).is_some() {
        return Ok(true);
    }

    // UTF-8 prose (Dutch, French...) is mostly ASCII with multibyte
    // accents, so count valid UTF-8 as text.
    if std::str::from_utf8(sample).is_ok() {
        return Ok(false);
    }

    let ascii_count = sample.iter().filter(|&&b| b < 128).count();
    let ascii_ratio = ascii_count as f64 / bytes_read as f64;

    Ok(ascii_ratio < ASCII_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_load_single_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("lion.txt");
        file.write_str("De leeuw is een grote katachtige.").unwrap();

        let documents = Loader::new().load(&[file.path()]).unwrap();

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].page_content, "De leeuw is een grote katachtige.");
        assert_eq!(documents[0].source(), Some(file.path().to_string_lossy().as_ref()));
    }

    #[test]
    fn test_explicit_file_ignores_extension_filter() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("notes.rst");
        file.write_str("Notes").unwrap();

        let documents = Loader::new().load(&[file.path()]).unwrap();
        assert_eq!(documents.len(), 1);
    }

    #[test]
    fn test_load_directory_sorted_and_filtered() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("b.md").write_str("# B").unwrap();
        temp.child("a.txt").write_str("A").unwrap();
        temp.child("nested/c.txt").write_str("C").unwrap();
        temp.child("skip.rs").write_str("fn main() {}").unwrap();
        temp.child("blob.txt").write_binary(&[0u8, 1, 2, 3]).unwrap();

        let documents = Loader::new().load(&[temp.path()]).unwrap();
        let contents: Vec<&str> = documents.iter().map(|d| d.page_content.as_str()).collect();

        assert_eq!(contents, vec!["A", "# B", "C"]);
    }

    #[test]
    fn test_custom_extensions() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("a.txt").write_str("A").unwrap();
        temp.child("b.RST").write_str("B").unwrap();

        let documents = Loader::new().extensions(["rst"]).load(&[temp.path()]).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].page_content, "B");
    }

    #[test]
    fn test_missing_path() {
        let err = Loader::new()
            .load(&[Path::new("/nonexistent/input.txt")])
            .unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_is_likely_binary() {
        let temp = assert_fs::TempDir::new().unwrap();

        let text = temp.child("text.txt");
        text.write_str("Hello, world!").unwrap();
        assert!(!is_likely_binary(text.path()).unwrap());

        let accented = temp.child("accented.txt");
        accented.write_str("variërend van okerbruin tot bijna wit").unwrap();
        assert!(!is_likely_binary(accented.path()).unwrap());

        let binary = temp.child("data.bin");
        binary.write_binary(&[0u8; 100]).unwrap();
        assert!(is_likely_binary(binary.path()).unwrap());

        let empty = temp.child("empty.txt");
        empty.touch().unwrap();
        assert!(!is_likely_binary(empty.path()).unwrap());
    }
}
