//! Provider-neutral chat types and the [`ChatModel`] seam.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions to the model
    System,
    /// Human turn
    User,
    /// Model turn
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author
    pub role: Role,

    /// Text content
    pub content: String,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// Creates a human message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }
}

/// A function the model may call, described with JSON Schema parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Function name
    pub name: String,
    /// What the function is for
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier assigned by the provider
    pub id: String,
    /// Name of the called tool
    pub name: String,
    /// Parsed arguments
    pub arguments: Value,
}

/// How the model should pick among bound tools.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolChoice {
    /// The model decides
    #[default]
    Auto,
    /// No tool calls
    None,
    /// At least one tool call
    Required,
    /// Call the named tool
    Tool {
        /// Tool name
        name: String,
    },
}

/// Messages plus the tools bound for one invocation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatRequest {
    /// Conversation to complete
    pub messages: Vec<ChatMessage>,
    /// Tools the model may call
    pub tools: Vec<ToolDefinition>,
    /// Tool selection mode
    pub tool_choice: ToolChoice,
}

impl ChatRequest {
    /// Creates a request without tools.
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Returns a copy of this request with different messages.
    #[must_use]
    pub fn with_messages(&self, messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            tools: self.tools.clone(),
            tool_choice: self.tool_choice.clone(),
        }
    }
}

/// Binds tools to an empty request; fill messages with
/// [`ChatRequest::with_messages`].
#[must_use]
pub fn bind_tools(tools: Vec<ToolDefinition>, tool_choice: ToolChoice) -> ChatRequest {
    ChatRequest {
        messages: Vec::new(),
        tools,
        tool_choice,
    }
}

/// The model's answer to a [`ChatRequest`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatResponse {
    /// Free text content, empty when the model only called tools
    pub content: String,
    /// Tool calls, in the order returned
    pub tool_calls: Vec<ToolCall>,
}

/// A chat-completion model that supports tool calling.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Runs one completion.
    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Model or deployment name, for logging.
    fn model_name(&self) -> &str;
}

#[async_trait]
impl<M: ChatModel + ?Sized> ChatModel for std::sync::Arc<M> {
    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse> {
        (**self).invoke(request).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}
