//! Local embeddings through an Ollama server.
//!
//! Requires the model to be pulled first (`ollama pull nomic-embed-text`).

use async_trait::async_trait;
use serde_json::{json, Value};

use knowledge_assistant_core::embedding::Embedder;
use knowledge_assistant_core::Result;

use super::http::{malformed, JsonClient};
use super::openai::to_vector;

pub const PROVIDER: &str = "ollama";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "nomic-embed-text";

/// `POST {base_url}/api/embed`.
pub struct OllamaEmbedder {
    http: JsonClient,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(http: JsonClient, base_url: &str, model: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/api/embed", self.base_url);
        let body = json!({ "model": self.model, "input": texts });
        let response = self.http.post_json(&url, &[], &body).await?;
        parse_embeddings(&response)
    }
}

fn parse_embeddings(json: &Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| malformed(PROVIDER, "missing embeddings array"))?
        .iter()
        .map(|row| {
            row.as_array()
                .and_then(|values| to_vector(values))
                .ok_or_else(|| malformed(PROVIDER, "non-numeric embedding"))
        })
        .collect()
}
