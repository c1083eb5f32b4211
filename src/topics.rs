//! The structured output the model is asked to produce.

use crate::chat::ToolDefinition;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::ops::RangeInclusive;

/// Accepted number of topics per document.
pub const TOPIC_COUNT: RangeInclusive<usize> = 2..=4;

/// Represents the main topics discussed in depth in a given context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTopics {
    /// 2 to 4 main topics discussed in depth in the given context
    pub topics: Vec<String>,
}

impl DocumentTopics {
    /// Name of the tool the model calls to return topics.
    pub const TOOL_NAME: &'static str = "DocumentTopics";

    /// Creates a validated topic list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TopicCount`] if the list holds fewer than 2 or more
    /// than 4 topics.
    pub fn new<I, S>(topics: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics = Self {
            topics: topics.into_iter().map(Into::into).collect(),
        };
        topics.validate()?;
        Ok(topics)
    }

    /// Builds topics from tool-call arguments and validates them.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the arguments do not match the
    /// schema, or [`Error::TopicCount`] if the count is out of bounds.
    pub fn from_arguments(arguments: &serde_json::Value) -> Result<Self> {
        let topics: Self = serde_json::from_value(arguments.clone())?;
        topics.validate()?;
        Ok(topics)
    }

    /// Checks the topic count bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TopicCount`] if the bounds are violated.
    pub fn validate(&self) -> Result<()> {
        if TOPIC_COUNT.contains(&self.topics.len()) {
            Ok(())
        } else {
            Err(Error::TopicCount {
                count: self.topics.len(),
            })
        }
    }

    /// Number of topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Returns true if there are no topics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Consumes the value, returning the topic strings.
    #[must_use]
    pub fn into_topics(self) -> Vec<String> {
        self.topics
    }

    /// The tool definition bound to the model.
    #[must_use]
    pub fn tool() -> ToolDefinition {
        ToolDefinition {
            name: Self::TOOL_NAME.to_string(),
            description: "Represents the main topics discussed in depth in a given context."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "topics": {
                        "type": "array",
                        "description": "2 to 4 main topics discussed in depth in the given context",
                        "items": { "type": "string" }
                    }
                },
                "required": ["topics"]
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert!(DocumentTopics::new(["a"]).is_err());
        assert!(DocumentTopics::new(["a", "b"]).is_ok());
        assert!(DocumentTopics::new(["a", "b", "c", "d"]).is_ok());

        let err = DocumentTopics::new(["a", "b", "c", "d", "e"]).unwrap_err();
        assert!(matches!(err, Error::TopicCount { count: 5 }));
        assert!(err.to_string().contains("Length: 5."));
    }

    #[test]
    fn test_from_arguments() {
        let args = json!({ "topics": ["Habitat of the lion", "Conservation status"] });
        let topics = DocumentTopics::from_arguments(&args).unwrap();
        assert_eq!(topics.len(), 2);
        assert_eq!(topics.topics[0], "Habitat of the lion");
    }

    #[test]
    fn test_from_arguments_rejects_wrong_shape() {
        let err = DocumentTopics::from_arguments(&json!({ "topics": "one" })).unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));

        let err = DocumentTopics::from_arguments(&json!({})).unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));

        let err = DocumentTopics::from_arguments(&json!({ "topics": [] })).unwrap_err();
        assert!(matches!(err, Error::TopicCount { count: 0 }));
    }

    #[test]
    fn test_tool_schema() {
        let tool = DocumentTopics::tool();
        assert_eq!(tool.name, "DocumentTopics");
        assert_eq!(tool.parameters["required"][0], "topics");
        assert_eq!(tool.parameters["properties"]["topics"]["items"]["type"], "string");
    }
}
