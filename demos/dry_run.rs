//! Dry run example
//!
//! Runs the full generation flow against an offline chat model, so the
//! chunks and prompts can be inspected without an Azure deployment.

use async_trait::async_trait;
use doctopics::{
    ChatModel, ChatRequest, ChatResponse, Document, DocumentTopics, PromptTemplate, ToolCall,
    TopicGenerator,
};
use serde_json::json;

/// Answers every request with the first words of the chunk as topics.
struct OfflineModel;

#[async_trait]
impl ChatModel for OfflineModel {
    async fn invoke(&self, request: &ChatRequest) -> doctopics::Result<ChatResponse> {
        let chunk = request
            .messages
            .last()
            .and_then(|m| m.content.rsplit("Context: ").next())
            .unwrap_or_default();

        let mut topics: Vec<&str> = chunk.split_whitespace().take(3).collect();
        topics.resize(topics.len().max(2), "General");

        Ok(ChatResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "offline".to_string(),
                name: DocumentTopics::TOOL_NAME.to_string(),
                arguments: json!({ "topics": topics }),
            }],
        })
    }

    fn model_name(&self) -> &str {
        "offline"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let text = "Lions live in prides on the African savanna.\n\n\
                Photosynthesis turns light into chemical energy.\n\n\
                Glaciers carve deep valleys over thousands of years.";

    let mut generator = TopicGenerator::from_documents(
        &[Document::new(text).meta("source", "inline")],
        OfflineModel,
        60,
        0,
        PromptTemplate::new()?.language("English"),
    )?;

    println!("Running with an offline model - no API calls\n");

    // Show what would be sent for the first chunk
    for message in generator.render_all()?.remove(0) {
        println!("[{:?}] {}\n", message.role, message.content);
    }

    let (chunks, stats) = generator.generate_with_stats().await?;

    for chunk in chunks {
        println!("{:<55} -> {:?}", chunk.page_content, chunk.topics().unwrap_or_default());
    }

    println!("\n{} chunks, {:.1} topics on average", stats.documents, stats.avg_topics);

    Ok(())
}
