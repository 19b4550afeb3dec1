//! Upstream model providers.
//!
//! Providers are chosen once, at construction, from configuration and then
//! used through the core traits:
//!
//! | Concern | Trait | Providers |
//! |---------|-------|-----------|
//! | Embeddings | [`Embedder`] | `openai` ([`OpenAIEmbedder`]), `ollama` ([`OllamaEmbedder`]) |
//! | Generation | [`Generator`] | `openai` ([`OpenAIChat`]), `anthropic` ([`AnthropicMessages`]) |
//!
//! The embedding provider is configured independently of the generation
//! provider. API keys come only from the environment (`OPENAI_API_KEY`,
//! `ANTHROPIC_API_KEY`); a missing key is a configuration error.

pub mod anthropic;
pub mod http;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use knowledge_assistant_core::embedding::Embedder;
use knowledge_assistant_core::generation::Generator;
use knowledge_assistant_core::{Error, Result};

use crate::config::{EmbeddingConfig, GenerationConfig};

pub use anthropic::AnthropicMessages;
pub use http::JsonClient;
pub use ollama::OllamaEmbedder;
pub use openai::{OpenAIChat, OpenAIEmbedder};

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

/// Build the configured embedder, reading credentials from the environment.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    create_embedder_with(config, |key| std::env::var(key).ok())
}

/// Build the configured generator, reading credentials from the environment.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    create_generator_with(config, |key| std::env::var(key).ok())
}

pub fn create_embedder_with<F>(config: &EmbeddingConfig, lookup: F) -> Result<Arc<dyn Embedder>>
where
    F: Fn(&str) -> Option<String>,
{
    match config.provider.as_str() {
        "openai" => {
            let api_key = require_key(&lookup, OPENAI_API_KEY)?;
            Ok(Arc::new(OpenAIEmbedder::new(
                JsonClient::new(openai::PROVIDER, config.http)?,
                config.base_url.as_deref().unwrap_or(openai::DEFAULT_BASE_URL),
                api_key,
                model_or(&config.model, openai::DEFAULT_EMBED_MODEL),
            )))
        }
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(
            JsonClient::new(ollama::PROVIDER, config.http)?,
            config.base_url.as_deref().unwrap_or(ollama::DEFAULT_BASE_URL),
            model_or(&config.model, ollama::DEFAULT_MODEL),
        ))),
        other => Err(Error::Configuration(format!(
            "Unknown embedding provider: '{other}'. Must be openai or ollama."
        ))),
    }
}

pub fn create_generator_with<F>(config: &GenerationConfig, lookup: F) -> Result<Arc<dyn Generator>>
where
    F: Fn(&str) -> Option<String>,
{
    match config.provider.as_str() {
        "openai" => {
            let api_key = require_key(&lookup, OPENAI_API_KEY)?;
            Ok(Arc::new(OpenAIChat::new(
                JsonClient::new(openai::PROVIDER, config.http)?,
                config.base_url.as_deref().unwrap_or(openai::DEFAULT_BASE_URL),
                api_key,
                model_or(&config.model, openai::DEFAULT_CHAT_MODEL),
                config.temperature,
            )))
        }
        "anthropic" => {
            let api_key = require_key(&lookup, ANTHROPIC_API_KEY)?;
            Ok(Arc::new(AnthropicMessages::new(
                JsonClient::new(anthropic::PROVIDER, config.http)?,
                config.base_url.as_deref().unwrap_or(anthropic::DEFAULT_BASE_URL),
                api_key,
                model_or(&config.model, anthropic::DEFAULT_MODEL),
                config.max_tokens,
            )))
        }
        other => Err(Error::Configuration(format!(
            "Unknown generation provider: '{other}'. Must be openai or anthropic."
        ))),
    }
}

fn require_key<F>(lookup: &F, name: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Configuration(format!("{name} is missing")))
}

fn model_or(model: &Option<String>, default: &str) -> String {
    model.clone().unwrap_or_else(|| default.to_string())
}
