//! Anthropic Messages API generator.

use async_trait::async_trait;
use serde_json::{json, Value};

use knowledge_assistant_core::generation::Generator;
use knowledge_assistant_core::Result;

use super::http::{malformed, JsonClient};

pub const PROVIDER: &str = "anthropic";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const API_VERSION: &str = "2023-06-01";

/// `POST {base_url}/v1/messages` with a system prompt and one user turn.
pub struct AnthropicMessages {
    http: JsonClient,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicMessages {
    pub fn new(
        http: JsonClient,
        base_url: &str,
        api_key: String,
        model: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            max_tokens,
        }
    }
}

#[async_trait]
impl Generator for AnthropicMessages {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.base_url);
        let headers = [
            ("x-api-key", self.api_key.clone()),
            ("anthropic-version", API_VERSION.to_string()),
        ];
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": [ { "role": "user", "content": user } ],
        });

        let response = self.http.post_json(&url, &headers, &body).await?;
        join_text_blocks(&response)
    }
}

/// Concatenate the `text` of every content block; non-text blocks add nothing.
fn join_text_blocks(json: &Value) -> Result<String> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| malformed(PROVIDER, "missing content array"))?;

    Ok(blocks
        .iter()
        .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
        .collect())
}
