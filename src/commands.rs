//! Implementations of the `ka` subcommands other than `serve`.
//!
//! Each command builds its providers from configuration, runs once and
//! prints to stdout.

use std::sync::Arc;

use anyhow::Context;

use knowledge_assistant_core::{Error, Result};

use crate::ask::{validate_top_k, AskRequest, Assistant};
use crate::config::Config;
use crate::llm::{create_embedder, create_generator};
use crate::prompts::list_templates;
use crate::retriever::Retriever;

const SNIPPET_CHARS: usize = 200;

fn build_retriever(config: &Config) -> anyhow::Result<Arc<Retriever>> {
    let embedder = create_embedder(&config.embedding)?;
    Ok(Arc::new(Retriever::new(
        embedder,
        &config.corpus,
        &config.chunking,
    )))
}

/// `ka index build [--rebuild]`
pub async fn run_index_build(config: &Config, rebuild: bool) -> anyhow::Result<()> {
    let path = &config.corpus.index_path;
    if rebuild && tokio::fs::try_exists(path).await? {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("failed to remove {}", path.display()))?;
        println!("Removed existing index {}", path.display());
    }

    let retriever = build_retriever(config)?;
    retriever.warmup().await?;

    println!(
        "Index ready: {} chunks in {}",
        retriever.len().unwrap_or(0),
        path.display()
    );
    Ok(())
}

/// `ka search <query> [--top-k N]`
pub async fn run_search(config: &Config, query: &str, top_k: Option<usize>) -> anyhow::Result<()> {
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    validate_search(query, top_k)?;
    let retriever = build_retriever(config)?;
    let results = retriever.search(query, top_k).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {}",
            i + 1,
            result.score,
            result.chunk.chunk_id
        );
        println!("    {}", snippet(&result.chunk.text));
        println!();
    }
    Ok(())
}

/// `ka ask <question> [--top-k N] [--template NAME] [--debug-prompt]`
pub async fn run_ask(config: &Config, request: AskRequest) -> anyhow::Result<()> {
    let retriever = build_retriever(config)?;
    let generator = create_generator(&config.generation)?;
    let assistant = Assistant::new(config, retriever, generator);

    let request_id = uuid::Uuid::new_v4().to_string();
    let response = assistant.ask(&request_id, request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// `ka templates`
pub fn run_templates(config: &Config) {
    for t in list_templates() {
        let marker = if t.name == config.prompts.template {
            " (default)"
        } else {
            ""
        };
        println!("{} {}{}", t.name, t.version, marker);
        println!("    {}", t.description);
    }
}

fn validate_search(query: &str, top_k: usize) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::Validation("query must not be empty".to_string()));
    }
    validate_top_k(top_k)
}

fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
