use crate::{
    chat::{ChatMessage, ChatModel, ChatRequest, ToolChoice, bind_tools},
    config::Config,
    document::Document,
    error::{Error, Result},
    parser::ToolsParser,
    prompt::PromptTemplate,
    splitter::TextSplitter,
    topics::DocumentTopics,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Concurrent model calls when no limit is configured.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Statistics collected during a generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationStats {
    /// Number of annotated documents
    pub documents: usize,

    /// Topics across all documents
    pub total_topics: usize,

    /// Fewest topics on a single document
    pub min_topics: usize,

    /// Most topics on a single document
    pub max_topics: usize,

    /// Mean topics per document
    pub avg_topics: f64,

    /// Wall-clock time of the run
    pub duration: Duration,
}

impl GenerationStats {
    /// Computes statistics from annotated documents.
    #[must_use]
    pub fn new(documents: &[Document], duration: Duration) -> Self {
        let counts: Vec<usize> = documents
            .iter()
            .map(|d| d.topics().map_or(0, |t| t.len()))
            .collect();

        let total_topics: usize = counts.iter().sum();

        let avg_topics = if counts.is_empty() {
            0.0
        } else {
            total_topics as f64 / counts.len() as f64
        };

        Self {
            documents: counts.len(),
            total_topics,
            min_topics: counts.iter().copied().min().unwrap_or(0),
            max_topics: counts.iter().copied().max().unwrap_or(0),
            avg_topics,
            duration,
        }
    }

    /// Prints a human-readable summary to stderr.
    pub fn print_summary(&self) {
        eprintln!("\n╔═══════════════════════════════════════════════════════╗");
        eprintln!("║            Topic Generation Summary                   ║");
        eprintln!("╠═══════════════════════════════════════════════════════╣");
        eprintln!(
            "║ Documents:            {:>8}                        ║",
            self.documents
        );
        eprintln!(
            "║ Total Topics:         {:>8}                        ║",
            self.total_topics
        );
        eprintln!(
            "║ Topics/Document:      {:>8.2}                        ║",
            self.avg_topics
        );
        eprintln!(
            "║   - Min:              {:>8}                        ║",
            self.min_topics
        );
        eprintln!(
            "║   - Max:              {:>8}                        ║",
            self.max_topics
        );
        eprintln!("║                                                       ║");
        eprintln!(
            "║ Total Time:           {:>8.2}s                       ║",
            self.duration.as_secs_f64()
        );
        eprintln!(
            "║ Throughput:           {:>8.2} docs/s                  ║",
            self.throughput_docs_per_sec()
        );
        eprintln!("╚═══════════════════════════════════════════════════════╝\n");
    }

    /// Returns the throughput in documents per second, or 0 when no time
    /// was measured.
    #[must_use]
    pub fn throughput_docs_per_sec(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.documents as f64 / secs
        } else {
            0.0
        }
    }
}

/// Annotates documents with the main topics a chat model finds in them.
///
/// Each document is rendered through the [`PromptTemplate`], sent to the
/// model with the `DocumentTopics` tool forced, and the first validated
/// tool call is written into the document metadata under `"topics"`.
///
/// # Examples
///
/// ```no_run
/// use doctopics::{Document, PromptTemplate, TopicGenerator, azure_chat_openai};
///
/// # async fn run() -> doctopics::Result<()> {
/// let documents = vec![Document::new("De leeuw is een grote katachtige.")];
/// let mut generator = TopicGenerator::from_documents(
///     &documents,
///     azure_chat_openai()?,
///     1000,
///     0,
///     PromptTemplate::new()?,
/// )?;
///
/// for document in generator.generate().await? {
///     println!("{:?}", document.topics());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TopicGenerator<M> {
    llm: M,
    documents: Vec<Document>,
    prompt: PromptTemplate,
    request: ChatRequest,
    parser: ToolsParser,
    max_concurrency: Option<usize>,
}

impl<M: ChatModel> TopicGenerator<M> {
    /// Creates a generator over already chunked documents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDocuments`] if `documents` is empty.
    pub fn new(llm: M, documents: Vec<Document>, prompt: PromptTemplate) -> Result<Self> {
        if documents.is_empty() {
            return Err(Error::EmptyDocuments);
        }

        let request = bind_tools(
            vec![DocumentTopics::tool()],
            ToolChoice::Tool {
                name: DocumentTopics::TOOL_NAME.to_string(),
            },
        );

        Ok(Self {
            llm,
            documents,
            prompt,
            request,
            parser: ToolsParser::new().first_only(),
            max_concurrency: None,
        })
    }

    /// Splits raw documents into chunks, then creates a generator over
    /// the chunks.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid chunk settings and
    /// [`Error::EmptyDocuments`] if splitting yields no chunks.
    pub fn from_documents(
        documents: &[Document],
        llm: M,
        chunk_size: usize,
        chunk_overlap: usize,
        prompt: PromptTemplate,
    ) -> Result<Self> {
        let splitter = TextSplitter::new(chunk_size, chunk_overlap)?;
        Self::new(llm, splitter.split_documents(documents), prompt)
    }

    /// Creates a generator with splitter, prompt and concurrency settings
    /// taken from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, a template cannot
    /// be loaded, or splitting yields no chunks.
    pub fn from_config(documents: &[Document], llm: M, config: &Config) -> Result<Self> {
        config.validate()?;

        let splitter = TextSplitter::from_config(config)?;
        let prompt = PromptTemplate::from_config(config)?;

        let mut generator = Self::new(llm, splitter.split_documents(documents), prompt)?;
        generator.max_concurrency = config.max_concurrency;
        Ok(generator)
    }

    /// Limits how many model calls run at once, overriding
    /// [`DEFAULT_MAX_CONCURRENCY`].
    #[must_use]
    pub const fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    /// The held documents.
    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Consumes the generator, returning its documents.
    #[must_use]
    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }

    /// Renders the message list for every held document without calling
    /// the model.
    ///
    /// # Errors
    ///
    /// Returns an error if a template fails to render.
    pub fn render_all(&self) -> Result<Vec<Vec<ChatMessage>>> {
        self.documents
            .iter()
            .map(|document| self.prompt.format_messages(&document.page_content))
            .collect()
    }

    /// Generates topics for every document and stores them in its
    /// metadata, in input order.
    ///
    /// # Errors
    ///
    /// Returns the first failure of the batch: a model call error,
    /// [`Error::MissingToolCall`] or [`Error::TopicCount`].
    #[instrument(skip(self), fields(model = self.llm.model_name(), documents = self.documents.len()))]
    pub async fn generate(&mut self) -> Result<&[Document]> {
        let inputs = self.render_all()?;
        let results = self.batch(inputs).await?;

        for (document, result) in self.documents.iter_mut().zip(results) {
            document.set_topics(&result.topics);
        }

        Ok(&self.documents)
    }

    /// Like [`generate`](Self::generate), also returning statistics.
    ///
    /// # Errors
    ///
    /// See [`generate`](Self::generate).
    pub async fn generate_with_stats(&mut self) -> Result<(&[Document], GenerationStats)> {
        let start_time = Instant::now();
        self.generate().await?;

        let stats = GenerationStats::new(&self.documents, start_time.elapsed());
        info!(
            "Generated {} topics for {} documents in {:.2}s",
            stats.total_topics,
            stats.documents,
            stats.duration.as_secs_f64()
        );

        Ok((&self.documents, stats))
    }

    async fn batch(&self, inputs: Vec<Vec<ChatMessage>>) -> Result<Vec<DocumentTopics>> {
        let limit = self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY).max(1);
        let total = inputs.len();

        info!("Invoking {} on {} documents (concurrency {})", self.llm.model_name(), total, limit);

        let llm = &self.llm;
        let request = &self.request;
        let parser = self.parser;

        stream::iter(inputs.into_iter().enumerate())
            .map(|(index, messages)| async move {
                let response = llm.invoke(&request.with_messages(messages)).await?;

                let topics = parser
                    .parse(&response)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::missing_tool_call(DocumentTopics::TOOL_NAME))?;

                debug!("Document {}/{}: {} topics", index + 1, total, topics.len());
                Ok::<_, Error>(topics)
            })
            .buffered(limit)
            .try_collect()
            .await
    }
}
