//! # doctopics
//!
//! Extracts the main topics of document chunks with a hosted chat model and
//! attaches them to each chunk's metadata under `"topics"`.
//!
//! ## Features
//!
//! - Separator-based text splitting with overlap and optional start offsets
//! - Few-shot chat prompt built from Tera templates, overridable from files
//! - Structured output through a forced `DocumentTopics` tool call,
//!   validated to hold 2 to 4 topics
//! - Concurrent, order-preserving batch over an Azure OpenAI deployment
//! - Plain-text loading and atomic JSON output
//!
//! ## Quick Start
//!
//! ```no_run
//! use doctopics::{Document, PromptTemplate, TopicGenerator, azure_chat_openai};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let documents = vec![Document::new(std::fs::read_to_string("lion.txt")?)];
//!
//! let mut generator = TopicGenerator::from_documents(
//!     &documents,
//!     azure_chat_openai()?,
//!     1000,
//!     0,
//!     PromptTemplate::new()?,
//! )?;
//!
//! for chunk in generator.generate().await? {
//!     println!("{:?}", chunk.topics());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! 1. **Splitter**: divides documents into bounded chunks
//! 2. **Prompt**: renders system, few-shot and human messages per chunk
//! 3. **Chat model**: answers with a `DocumentTopics` tool call
//! 4. **Parser**: validates the call and the generator stores the topics

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod azure;
mod chat;
mod config;
mod document;
mod error;
mod generator;
mod loader;
mod parser;
mod prompt;
mod splitter;
mod template_validator;
mod token;
mod topics;
mod writer;

pub use azure::{AzureChatOpenAI, azure_chat_openai};
pub use chat::{
    ChatMessage, ChatModel, ChatRequest, ChatResponse, Role, ToolCall, ToolChoice, ToolDefinition,
    bind_tools,
};
pub use config::{
    API_KEY_ENV, API_VERSION_ENV, Config, ConfigBuilder, DEPLOYMENT_ENV, ENDPOINT_ENV, LlmConfig,
};
pub use document::{Document, Metadata, TOPICS_KEY};
pub use error::{Error, Result};
pub use generator::{DEFAULT_MAX_CONCURRENCY, GenerationStats, TopicGenerator};
pub use loader::{Loader, SOURCE_KEY, TEXT_EXTENSIONS};
pub use parser::ToolsParser;
pub use prompt::{FewShotExample, PromptTemplate, default_examples};
pub use splitter::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SEPARATOR, START_INDEX_KEY, TextSplitter,
};
pub use token::{LengthFunction, TextLength};
pub use topics::{DocumentTopics, TOPIC_COUNT};
pub use writer::{Writer, read_documents};

/// Loads `paths`, splits them per `config`, and annotates every chunk
/// with topics from `llm`.
///
/// # Errors
///
/// Returns an error if loading fails, the configuration is invalid, no
/// chunks are produced, or any model call fails.
///
/// # Examples
///
/// ```no_run
/// use doctopics::{Config, azure_chat_openai, run};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let config = Config::builder().language("English").build()?;
/// let (chunks, stats) = run(&["./notes"], azure_chat_openai()?, &config).await?;
/// stats.print_summary();
/// # Ok(())
/// # }
/// ```
pub async fn run<P, M>(paths: &[P], llm: M, config: &Config) -> Result<(Vec<Document>, GenerationStats)>
where
    P: AsRef<std::path::Path>,
    M: ChatModel,
{
    let documents = Loader::new().load(paths)?;
    let mut generator = TopicGenerator::from_config(&documents, llm, config)?;
    let (_, stats) = generator.generate_with_stats().await?;
    Ok((generator.into_documents(), stats))
}
