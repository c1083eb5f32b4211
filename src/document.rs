use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key under which generated topics are stored.
pub const TOPICS_KEY: &str = "topics";

/// Key/value metadata attached to a [`Document`].
pub type Metadata = serde_json::Map<String, Value>;

/// A unit of text plus free-form metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text content
    pub page_content: String,

    /// Arbitrary metadata, carried through chunking unchanged
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Creates a document with empty metadata.
    #[must_use]
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Creates a document with the given metadata.
    #[must_use]
    pub fn with_metadata(page_content: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            page_content: page_content.into(),
            metadata,
        }
    }

    /// Inserts a metadata entry, returning the document for chaining.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the topics stored in the metadata, if any.
    #[must_use]
    pub fn topics(&self) -> Option<Vec<&str>> {
        self.metadata
            .get(TOPICS_KEY)?
            .as_array()?
            .iter()
            .map(Value::as_str)
            .collect()
    }

    /// Writes a topic list into the metadata, replacing any previous value.
    pub fn set_topics(&mut self, topics: &[String]) {
        self.metadata.insert(
            TOPICS_KEY.to_string(),
            Value::Array(topics.iter().cloned().map(Value::String).collect()),
        );
    }

    /// Returns the `source` metadata entry, if present.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_no_topics() {
        let doc = Document::new("text");
        assert_eq!(doc.page_content, "text");
        assert!(doc.metadata.is_empty());
        assert!(doc.topics().is_none());
    }

    #[test]
    fn test_set_topics() {
        let mut doc = Document::new("text").meta("source", "a.txt");
        doc.set_topics(&["one".to_string(), "two".to_string()]);

        assert_eq!(doc.topics(), Some(vec!["one", "two"]));
        assert_eq!(doc.source(), Some("a.txt"));
        assert_eq!(doc.page_content, "text");
    }

    #[test]
    fn test_topics_rejects_non_string_entries() {
        let doc = Document::new("text").meta(TOPICS_KEY, serde_json::json!(["a", 1]));
        assert!(doc.topics().is_none());
    }

    #[test]
    fn test_serde_shape() {
        let doc = Document::new("hello").meta("page", 3);
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["page_content"], "hello");
        assert_eq!(json["metadata"]["page"], 3);

        let back: Document = serde_json::from_str(r#"{"page_content":"x"}"#).unwrap();
        assert!(back.metadata.is_empty());
    }
}
