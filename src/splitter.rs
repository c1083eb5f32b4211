use crate::{
    config::Config,
    document::Document,
    error::{Error, Result},
    token::{LengthFunction, TextLength},
};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Default maximum chunk length.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 0;

/// Default separator pieces are split on.
pub const DEFAULT_SEPARATOR: &str = "\n\n";

/// Metadata key recording a chunk's character offset in its source.
pub const START_INDEX_KEY: &str = "start_index";

/// Splits text on a literal separator and merges the pieces back into
/// chunks of bounded length, optionally overlapping.
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separator: String,
    strip_whitespace: bool,
    add_start_index: bool,
    length_function: LengthFunction,
    length: Arc<dyn TextLength>,
}

impl std::fmt::Debug for TextSplitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextSplitter")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("separator", &self.separator)
            .field("strip_whitespace", &self.strip_whitespace)
            .field("add_start_index", &self.add_start_index)
            .field("length_function", &self.length_function.name())
            .finish_non_exhaustive()
    }
}

impl TextSplitter {
    /// Creates a splitter measuring length in characters.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero or `chunk_overlap` is
    /// larger than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_sizes(chunk_size, chunk_overlap)?;

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separator: DEFAULT_SEPARATOR.to_string(),
            strip_whitespace: true,
            add_start_index: false,
            length_function: LengthFunction::default(),
            length: LengthFunction::default().create(),
        })
    }

    /// Creates a splitter from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured sizes are invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.chunk_size, config.chunk_overlap)?
            .separator(config.separator.clone())
            .length_function(config.length_function)
            .add_start_index(config.add_start_index))
    }

    /// Sets the separator. An empty separator splits into characters.
    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Sets how chunk length is measured.
    #[must_use]
    pub fn length_function(mut self, kind: LengthFunction) -> Self {
        self.length_function = kind;
        self.length = kind.create();
        self
    }

    /// Enables recording of `start_index` metadata on split documents.
    #[must_use]
    pub const fn add_start_index(mut self, enabled: bool) -> Self {
        self.add_start_index = enabled;
        self
    }

    /// Enables or disables trimming of chunk whitespace.
    #[must_use]
    pub const fn strip_whitespace(mut self, enabled: bool) -> Self {
        self.strip_whitespace = enabled;
        self
    }

    /// Maximum chunk length.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks.
    #[must_use]
    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits text into chunks.
    ///
    /// Pieces are greedily merged while the chunk (pieces plus joining
    /// separators) stays within `chunk_size`. A piece that alone exceeds
    /// the limit becomes its own chunk.
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let pieces: Vec<&str> = if self.separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(self.separator.as_str())
                .filter(|piece| !piece.is_empty())
                .collect()
        };

        self.merge_pieces(&pieces)
    }

    /// Splits each document and returns one document per chunk.
    ///
    /// Every chunk carries a copy of its source document's metadata.
    #[must_use]
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        let mut chunks = Vec::new();

        for document in documents {
            let texts = self.split_text(&document.page_content);
            let mut previous_start: Option<usize> = None;

            for text in texts {
                let mut metadata = document.metadata.clone();

                if self.add_start_index {
                    let start = find_start(&document.page_content, &text, previous_start);
                    if let Some(byte_index) = start {
                        let char_index = document.page_content[..byte_index].chars().count();
                        metadata.insert(START_INDEX_KEY.to_string(), char_index.into());
                        previous_start = Some(byte_index);
                    }
                }

                chunks.push(Document::with_metadata(text, metadata));
            }
        }

        debug!(
            "Split {} documents into {} chunks (chunk_size={} {}, overlap={})",
            documents.len(),
            chunks.len(),
            self.chunk_size,
            self.length_function.name(),
            self.chunk_overlap
        );

        chunks
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let separator_len = self.length.measure(&self.separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = self.length.measure(piece);

            if total + len + joiner_len(current.len(), separator_len) > self.chunk_size {
                if total > self.chunk_size {
                    warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total, self.chunk_size
                    );
                }

                if !current.is_empty() {
                    self.push_joined(&current, &mut chunks);

                    // Drop leading pieces until what remains fits the overlap
                    // and leaves room for the incoming piece.
                    while total > self.chunk_overlap
                        || (total > 0
                            && total + len + joiner_len(current.len(), separator_len)
                                > self.chunk_size)
                    {
                        let joiner = if current.len() > 1 { separator_len } else { 0 };
                        let Some((_, first_len)) = current.pop_front() else {
                            break;
                        };
                        total = total.saturating_sub(first_len + joiner);
                    }
                }
            }

            current.push_back((piece, len));
            total += len + if current.len() > 1 { separator_len } else { 0 };
        }

        if total > self.chunk_size {
            warn!(
                "Created a chunk of size {}, which is longer than the specified {}",
                total, self.chunk_size
            );
        }
        self.push_joined(&current, &mut chunks);

        trace!("Merged {} pieces into {} chunks", pieces.len(), chunks.len());
        chunks
    }

    fn push_joined(&self, pieces: &VecDeque<(&str, usize)>, chunks: &mut Vec<String>) {
        let joined = pieces
            .iter()
            .map(|(piece, _)| *piece)
            .collect::<Vec<_>>()
            .join(&self.separator);

        let text = if self.strip_whitespace {
            joined.trim().to_string()
        } else {
            joined
        };

        if !text.is_empty() {
            chunks.push(text);
        }
    }
}

const fn joiner_len(pieces_in_chunk: usize, separator_len: usize) -> usize {
    if pieces_in_chunk > 0 { separator_len } else { 0 }
}

fn validate_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(Error::config("chunk_size must be greater than 0"));
    }

    if chunk_overlap > chunk_size {
        return Err(Error::config(format!(
            "Got a larger chunk overlap ({chunk_overlap}) than chunk size ({chunk_size}), should be smaller."
        )));
    }

    Ok(())
}

/// Finds the byte offset of `chunk` in `text`, searching after the previous
/// chunk's start so repeated passages map to successive occurrences.
fn find_start(text: &str, chunk: &str, previous_start: Option<usize>) -> Option<usize> {
    let from = match previous_start {
        None => 0,
        Some(prev) => prev + text[prev..].chars().next().map_or(0, char::len_utf8),
    };

    text[from..].find(chunk).map(|i| i + from)
}
