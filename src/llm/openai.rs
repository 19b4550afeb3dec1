//! OpenAI-compatible embeddings and chat completions.
//!
//! Both clients speak the public OpenAI REST shape, so any compatible
//! gateway can be used by pointing `base_url` at it.

use async_trait::async_trait;
use serde_json::{json, Value};

use knowledge_assistant_core::embedding::Embedder;
use knowledge_assistant_core::generation::Generator;
use knowledge_assistant_core::Result;

use super::http::{malformed, JsonClient};

pub const PROVIDER: &str = "openai";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-5";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-large";

fn auth_headers(api_key: &str) -> [(&'static str, String); 1] {
    [("Authorization", format!("Bearer {api_key}"))]
}

/// `POST {base_url}/embeddings`.
pub struct OpenAIEmbedder {
    http: JsonClient,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAIEmbedder {
    pub fn new(http: JsonClient, base_url: &str, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let body = json!({ "model": self.model, "input": texts });
        let response = self
            .http
            .post_json(&url, &auth_headers(&self.api_key), &body)
            .await?;
        parse_embeddings(&response)
    }
}

/// Extract `data[].embedding`, ordered by `data[].index` when present.
fn parse_embeddings(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| malformed(PROVIDER, "missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| malformed(PROVIDER, "missing embedding"))?;
        let vector = to_vector(embedding).ok_or_else(|| malformed(PROVIDER, "non-numeric embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

pub(super) fn to_vector(values: &[Value]) -> Option<Vec<f32>> {
    values.iter().map(|v| v.as_f64().map(|f| f as f32)).collect()
}

/// `POST {base_url}/chat/completions` with one system and one user message.
pub struct OpenAIChat {
    http: JsonClient,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAIChat {
    pub fn new(
        http: JsonClient,
        base_url: &str,
        api_key: String,
        model: String,
        temperature: f32,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            temperature,
        }
    }
}

#[async_trait]
impl Generator for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.temperature,
        });
        let response = self
            .http
            .post_json(&url, &auth_headers(&self.api_key), &body)
            .await?;

        response
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| malformed(PROVIDER, "missing choices[0].message.content"))
    }
}
