//! Basic example of using doctopics as a library
//!
//! Annotates a directory of notes with topics from the Azure OpenAI
//! deployment named in the environment (or a `.env` file).

use doctopics::{Config, Writer, azure_chat_openai};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Split into ~500 character chunks, topics in English
    let config = Config::builder()
        .chunk_size(500)
        .chunk_overlap(50)
        .language("English")
        .build()?;

    let (chunks, stats) = doctopics::run(&["./notes"], azure_chat_openai()?, &config).await?;

    stats.print_summary();

    Writer::new().write_documents(Path::new("./output/topics.json"), &chunks)?;

    println!("✓ Annotated {} chunks with {} topics", stats.documents, stats.total_topics);
    println!("✓ Output written to: ./output/topics.json");

    Ok(())
}
