use assert_fs::prelude::*;
use async_trait::async_trait;
use doctopics::{
    ChatModel, ChatRequest, ChatResponse, Config, Document, DocumentTopics, Error, PromptTemplate,
    Result, TOPIC_COUNT, ToolCall, TopicGenerator, Writer, read_documents, run,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Derives a topic list from the chunk text so every answer is distinct
/// but deterministic.
#[derive(Debug, Default)]
struct EchoTopicsModel {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for EchoTopicsModel {
    async fn invoke(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let input = request
            .messages
            .last()
            .map(|m| m.content.rsplit("Context: ").next().unwrap_or_default().to_string())
            .unwrap_or_default();

        let words: Vec<&str> = input.split_whitespace().take(4).collect();
        let topics = if words.len() < 2 {
            vec![input.clone(), "General".to_string()]
        } else {
            words.iter().map(|w| w.to_string()).collect()
        };

        Ok(ChatResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: format!("call_{}", self.calls.load(Ordering::SeqCst)),
                name: DocumentTopics::TOOL_NAME.to_string(),
                arguments: json!({ "topics": topics }),
            }],
        })
    }

    fn model_name(&self) -> &str {
        "echo-topics"
    }
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new("Lions live in prides on the savanna.").meta("source", "lion.txt"),
        Document::new("Photosynthesis converts light into chemical energy.")
            .meta("source", "plants.txt"),
        Document::new("Rivers carve valleys").meta("lang", "en"),
        Document::new("Kort").meta("id", 4),
    ]
}

#[tokio::test]
async fn every_document_receives_bounded_topics() {
    let model = Arc::new(EchoTopicsModel::default());
    let input = corpus();

    let mut generator =
        TopicGenerator::new(Arc::clone(&model), input.clone(), PromptTemplate::new().unwrap())
            .unwrap()
            .max_concurrency(2);

    let output = generator.generate().await.unwrap();

    assert_eq!(output.len(), input.len());
    assert_eq!(model.calls.load(Ordering::SeqCst), input.len());

    for (before, after) in input.iter().zip(output) {
        assert_eq!(before.page_content, after.page_content);

        let topics = after.topics().expect("topics metadata");
        assert!(TOPIC_COUNT.contains(&topics.len()));

        let mut without_topics = after.metadata.clone();
        without_topics.remove("topics");
        assert_eq!(without_topics, before.metadata);
    }

    assert_eq!(output[0].topics().unwrap(), vec!["Lions", "live", "in", "prides"]);
    assert_eq!(output[3].topics().unwrap(), vec!["Kort", "General"]);
}

#[tokio::test]
async fn empty_input_is_rejected_before_any_call() {
    let model = Arc::new(EchoTopicsModel::default());

    let err = TopicGenerator::new(Arc::clone(&model), Vec::new(), PromptTemplate::new().unwrap())
        .unwrap_err();
    assert!(matches!(err, Error::EmptyDocuments));

    let err = TopicGenerator::from_documents(
        &[],
        Arc::clone(&model),
        1000,
        0,
        PromptTemplate::new().unwrap(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::EmptyDocuments));

    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn chunks_inherit_metadata_and_start_index() {
    let text = "Lions hunt at night.\n\nZebras graze by day.\n\nRain falls in spring.";
    let config = Config::builder()
        .chunk_size(45)
        .add_start_index(true)
        .build()
        .unwrap();

    let mut generator = TopicGenerator::from_config(
        &[Document::new(text).meta("source", "wild.md")],
        EchoTopicsModel::default(),
        &config,
    )
    .unwrap();

    let chunks = generator.generate().await.unwrap();

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].page_content, "Lions hunt at night.\n\nZebras graze by day.");
    assert_eq!(chunks[1].page_content, "Rain falls in spring.");
    assert_eq!(chunks[1].metadata["start_index"], 44);
    assert!(chunks.iter().all(|c| c.source() == Some("wild.md")));
}

#[tokio::test]
async fn run_loads_annotates_and_writes() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("docs/a.txt").write_str("Glaciers shape mountain valleys slowly.").unwrap();
    temp.child("docs/b.md").write_str("# Bees\n\nBees pollinate flowering plants.").unwrap();
    temp.child("docs/skip.json").write_str("{}").unwrap();

    let config = Config::builder().build().unwrap();
    let (chunks, stats) = run(&[temp.child("docs").path()], EchoTopicsModel::default(), &config)
        .await
        .unwrap();

    assert_eq!(chunks.len(), 2);
    assert_eq!(stats.documents, 2);
    assert_eq!(stats.total_topics, 8);

    let output = temp.child("out/topics.json");
    Writer::new().write_documents(output.path(), &chunks).unwrap();

    let restored = read_documents(output.path()).unwrap();
    assert_eq!(restored, chunks);
    assert!(restored[1].source().unwrap().ends_with("b.md"));
}
