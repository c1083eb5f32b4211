use anyhow::Context;
use clap::Parser;
use doctopics::{
    AzureChatOpenAI, Config, Document, FewShotExample, LengthFunction, LlmConfig, Loader,
    PromptTemplate, TextSplitter, TopicGenerator, Writer,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "doctopics",
    version,
    author,
    about = "Extract the main topics of text documents with an Azure OpenAI deployment",
    long_about = "Split text documents into chunks and ask a hosted chat model for the 2 to 4 \
    main topics of every chunk. The result is a JSON array of chunks whose metadata carries a \
    \"topics\" list.\n\n\
    The deployment is configured through AZURE_DEPLOYMENT_NAME, AZURE_OPENAI_ENDPOINT, \
    AZURE_OPENAI_API_KEY and OPENAI_API_VERSION, read from the environment or a .env file.\n\n\
    USAGE EXAMPLES:\n  \
      # Annotate a single file and print the result\n  \
      doctopics notes/lion.txt\n\n  \
      # Annotate a directory of .txt/.md files into a JSON file\n  \
      doctopics ./docs --output topics.json --language English\n\n  \
      # Inspect chunks and rendered prompts without calling the model\n  \
      doctopics ./docs --chunk-size 500 --dry-run"
)]
struct Cli {
    /// Text files or directories of .txt/.md files
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Maximum chunk length
    #[arg(long, default_value_t = doctopics::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Length shared by consecutive chunks
    #[arg(long, default_value_t = doctopics::DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Separator to split on; `\n` and `\t` escapes are understood
    #[arg(long, default_value = "\\n\\n")]
    separator: String,

    /// How chunk length is measured
    #[arg(long, value_enum, default_value = "characters")]
    length_function: CliLengthFunction,

    /// Record each chunk's character offset as `start_index`
    #[arg(long)]
    add_start_index: bool,

    /// Language the topics are written in
    #[arg(short, long, default_value = "Dutch", env = "DOCTOPICS_LANGUAGE")]
    language: String,

    /// Tera template replacing the system message
    #[arg(long, value_name = "FILE")]
    system_template: Option<PathBuf>,

    /// Tera template replacing the human message; must use `{{ ctx.input }}`
    #[arg(long, value_name = "FILE")]
    human_template: Option<PathBuf>,

    /// JSON file with few-shot examples replacing the built-in ones
    ///
    /// Format: [{"context": "...", "output": {"topics": ["...", "..."]}}]
    #[arg(long, value_name = "FILE")]
    examples: Option<PathBuf>,

    /// Custom template data in key=value format (can be used multiple times)
    ///
    /// Available in templates under `ctx.custom`.
    #[arg(long = "template-data", value_name = "KEY=VALUE")]
    template_data: Vec<String>,

    /// Maximum number of concurrent model calls [default: 4]
    #[arg(long, value_name = "N")]
    max_concurrency: Option<usize>,

    /// Write the annotated chunks to this JSON file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Keep a timestamped copy of an existing output file
    #[arg(long)]
    backup: bool,

    /// Split and render prompts only; no model call
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliLengthFunction {
    Characters,
    SimpleTokens,
    EnhancedTokens,
}

impl From<CliLengthFunction> for LengthFunction {
    fn from(kind: CliLengthFunction) -> Self {
        match kind {
            CliLengthFunction::Characters => Self::Characters,
            CliLengthFunction::SimpleTokens => Self::SimpleTokens,
            CliLengthFunction::EnhancedTokens => Self::EnhancedTokens,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_error = load_dotenv(None);
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    if let Some(e) = dotenv_error {
        warn!("Failed to load .env file: {}", e);
    }

    let config = build_config(&cli).context("Failed to build configuration")?;

    let documents = Loader::new()
        .load(&cli.paths)
        .context("Failed to load input documents")?;
    info!("Loaded {} documents", documents.len());

    if cli.dry_run {
        return dry_run(&documents, &config);
    }

    let llm = LlmConfig::from_env()
        .and_then(AzureChatOpenAI::new)
        .context("Failed to configure the Azure OpenAI client")?;

    let mut generator = TopicGenerator::from_config(&documents, llm, &config)
        .context("Failed to create topic generator")?;

    let (chunks, stats) = generator
        .generate_with_stats()
        .await
        .context("Topic generation failed")?;

    let writer = Writer::new().backup_existing(cli.backup);

    match cli.output {
        Some(ref path) => {
            writer
                .write_documents(path, chunks)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            stats.print_summary();
        }
        None => println!("{}", writer.to_json(chunks)?),
    }

    Ok(())
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut builder = Config::builder()
        .chunk_size(cli.chunk_size)
        .chunk_overlap(cli.chunk_overlap)
        .separator(unescape(&cli.separator))
        .length_function(cli.length_function.into())
        .add_start_index(cli.add_start_index)
        .language(cli.language.clone());

    if let Some(ref path) = cli.system_template {
        builder = builder.system_template_path(path);
    }

    if let Some(ref path) = cli.human_template {
        builder = builder.human_template_path(path);
    }

    if let Some(ref path) = cli.examples {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read examples file {}", path.display()))?;
        let examples: Vec<FewShotExample> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid examples file {}", path.display()))?;
        builder = builder.examples(examples);
    }

    if !cli.template_data.is_empty() {
        let mut custom_data = HashMap::new();
        for item in &cli.template_data {
            if let Some((key, value)) = item.split_once('=') {
                custom_data.insert(key.to_string(), Value::String(value.to_string()));
            } else {
                warn!("Invalid template-data format '{}', expected KEY=VALUE", item);
            }
        }
        builder = builder.custom_data(custom_data);
    }

    if let Some(limit) = cli.max_concurrency {
        builder = builder.max_concurrency(limit);
    }

    Ok(builder.build()?)
}

/// Prints every chunk with the messages that would be sent for it.
fn dry_run(documents: &[Document], config: &Config) -> anyhow::Result<()> {
    let splitter = TextSplitter::from_config(config)?;
    let prompt = PromptTemplate::from_config(config).context("Failed to load prompt templates")?;

    let chunks = splitter.split_documents(documents);
    info!("Dry run: {} chunks, no model calls", chunks.len());

    let mut rendered = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        rendered.push(serde_json::json!({
            "page_content": chunk.page_content,
            "metadata": chunk.metadata,
            "messages": prompt.format_messages(&chunk.page_content)?,
        }));
    }

    println!("{}", serde_json::to_string_pretty(&rendered)?);
    Ok(())
}

/// Loads a `.env` file into the process environment. Runs before argument
/// parsing so clap's `env` fallbacks see its values. A missing file is not
/// an error.
fn load_dotenv(path: Option<&Path>) -> Option<dotenvy::Error> {
    let result = match path {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };

    result.err().filter(|e| !e.not_found())
}

fn unescape(separator: &str) -> String {
    separator
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\r", "\r")
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("doctopics=info"),
        1 => EnvFilter::new("doctopics=debug"),
        _ => EnvFilter::new("doctopics=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_writer(std::io::stderr),
        )
        .init();

    Ok(())
}
