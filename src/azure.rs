//! Azure OpenAI chat-completions client with tool calling.

use crate::{
    chat::{ChatMessage, ChatModel, ChatRequest, ChatResponse, ToolCall, ToolChoice, ToolDefinition},
    config::LlmConfig,
    error::{Error, Result},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    /// JSON-encoded arguments object
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Chat model backed by an Azure OpenAI deployment.
#[derive(Debug, Clone)]
pub struct AzureChatOpenAI {
    client: reqwest::Client,
    config: LlmConfig,
}

impl AzureChatOpenAI {
    /// Creates a client for the configured deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    /// Creates a client from environment variables.
    ///
    /// # Errors
    ///
    /// See [`LlmConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        Self::new(LlmConfig::from_env()?)
    }

    /// Connection settings in use.
    #[must_use]
    pub const fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn request_body<'a>(&self, request: &'a ChatRequest) -> CompletionRequest<'a> {
        let tools: Vec<WireTool<'a>> = request
            .tools
            .iter()
            .map(|function| WireTool {
                kind: "function",
                function,
            })
            .collect();

        let tool_choice = (!tools.is_empty()).then(|| tool_choice_value(&request.tool_choice));

        CompletionRequest {
            messages: &request.messages,
            tools,
            tool_choice,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

fn tool_choice_value(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Tool { name } => json!({ "type": "function", "function": { "name": name } }),
    }
}

/// Decodes a successful completions body.
fn parse_completion(body: &str) -> Result<ChatResponse> {
    let response: CompletionResponse = serde_json::from_str(body)?;

    let Some(choice) = response.choices.into_iter().next() else {
        return Err(Error::Serialization {
            message: "completion response contained no choices".to_string(),
        });
    };

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| {
            Ok(ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: serde_json::from_str(&call.function.arguments)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
    })
}

/// Maps a non-success response to an error, preferring the service's
/// own message.
fn api_error(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    Error::api(status, message)
}

#[async_trait]
impl ChatModel for AzureChatOpenAI {
    #[instrument(skip_all, fields(deployment = %self.config.deployment, messages = request.messages.len()))]
    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let started = Instant::now();

        let response = self
            .client
            .post(self.config.completions_url())
            .header("api-key", &self.config.api_key)
            .json(&self.request_body(request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        debug!(
            "Completion returned HTTP {} in {:.2}s",
            status.as_u16(),
            started.elapsed().as_secs_f64()
        );

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        parse_completion(&body)
    }

    fn model_name(&self) -> &str {
        &self.config.deployment
    }
}

/// Builds an [`AzureChatOpenAI`] from the environment; the deployment is
/// named by `AZURE_DEPLOYMENT_NAME`.
///
/// # Errors
///
/// See [`LlmConfig::from_env`].
pub fn azure_chat_openai() -> Result<AzureChatOpenAI> {
    AzureChatOpenAI::from_env()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::bind_tools;
    use crate::topics::DocumentTopics;

    fn client() -> AzureChatOpenAI {
        AzureChatOpenAI::new(LlmConfig::new(
            "https://example.openai.azure.com",
            "gpt-4o",
            "secret",
        ))
        .unwrap()
    }

    #[test]
    fn test_request_body_with_forced_tool() {
        let client = client();
        let request = bind_tools(
            vec![DocumentTopics::tool()],
            ToolChoice::Tool {
                name: DocumentTopics::TOOL_NAME.to_string(),
            },
        )
        .with_messages(vec![ChatMessage::system("sys"), ChatMessage::user("hi")]);

        let body = serde_json::to_value(client.request_body(&request)).unwrap();

        assert_eq!(body["messages"][0], json!({ "role": "system", "content": "sys" }));
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "DocumentTopics");
        assert_eq!(body["tools"][0]["function"]["parameters"]["type"], "object");
        assert_eq!(body["tool_choice"]["function"]["name"], "DocumentTopics");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_request_body_without_tools() {
        let client = client();
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        let body = serde_json::to_value(client.request_body(&request)).unwrap();

        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn test_tool_choice_values() {
        assert_eq!(tool_choice_value(&ToolChoice::Auto), json!("auto"));
        assert_eq!(tool_choice_value(&ToolChoice::None), json!("none"));
        assert_eq!(tool_choice_value(&ToolChoice::Required), json!("required"));
    }

    #[test]
    fn test_parse_tool_call_response() {
        let body = r#"{
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {
                            "name": "DocumentTopics",
                            "arguments": "{\"topics\":[\"Leefgebied van de leeuw\",\"Bedreigde status\"]}"
                        }
                    }]
                }
            }]
        }"#;

        let response = parse_completion(body).unwrap();
        assert!(response.content.is_empty());
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].id, "call_abc");
        assert_eq!(response.tool_calls[0].arguments["topics"][1], "Bedreigde status");
    }

    #[test]
    fn test_parse_text_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Hello"}}]}"#;
        let response = parse_completion(body).unwrap();
        assert_eq!(response.content, "Hello");
        assert!(response.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_invalid_arguments() {
        let body = r#"{"choices":[{"message":{"tool_calls":[{"id":"c","function":{"name":"DocumentTopics","arguments":"{not json"}}]}}]}"#;
        assert!(matches!(parse_completion(body), Err(Error::Serialization { .. })));
    }

    #[test]
    fn test_parse_no_choices() {
        assert!(parse_completion(r#"{"choices":[]}"#).is_err());
    }

    #[test]
    fn test_api_error_mapping() {
        let err = api_error(
            429,
            r#"{"error":{"code":"429","message":"Requests to the deployment have exceeded the rate limit."}}"#,
        );
        assert!(matches!(err, Error::Api { status: 429, .. }));
        assert!(err.to_string().contains("exceeded the rate limit"));

        let err = api_error(502, "Bad Gateway\n");
        assert_eq!(err.to_string(), "API error (HTTP 502): Bad Gateway");
    }

    #[test]
    fn test_model_name_is_deployment() {
        assert_eq!(client().model_name(), "gpt-4o");
    }
}
