use crate::chat::ChatResponse;
use crate::error::Result;
use crate::topics::DocumentTopics;
use tracing::{debug, trace};

/// Turns tool calls in a model response into validated [`DocumentTopics`].
///
/// Calls to other tools are ignored. Every matching call is parsed and
/// validated; the first failure is returned.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolsParser {
    first_only: bool,
}

impl ToolsParser {
    /// Creates a parser returning all matching tool calls.
    #[must_use]
    pub const fn new() -> Self {
        Self { first_only: false }
    }

    /// Only parse the first matching tool call.
    #[must_use]
    pub const fn first_only(mut self) -> Self {
        self.first_only = true;
        self
    }

    /// Parses a response.
    ///
    /// # Errors
    ///
    /// Returns a serialization error for malformed arguments and
    /// [`Error::TopicCount`](crate::Error::TopicCount) for lists outside
    /// the accepted bounds.
    pub fn parse(&self, response: &ChatResponse) -> Result<Vec<DocumentTopics>> {
        let calls = response
            .tool_calls
            .iter()
            .filter(|call| call.name == DocumentTopics::TOOL_NAME);

        let mut parsed = Vec::new();
        for call in calls {
            trace!("Parsing tool call {} ({})", call.id, call.name);
            parsed.push(DocumentTopics::from_arguments(&call.arguments)?);

            if self.first_only {
                break;
            }
        }

        if parsed.is_empty() && !response.content.is_empty() {
            debug!("Model answered with text instead of a tool call: {}", response.content);
        }

        Ok(parsed)
    }
}
