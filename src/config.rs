//! TOML configuration with environment overrides.
//!
//! Configuration is loaded once at startup and passed by reference to the
//! components that need it; nothing reads it from global state.
//!
//! Resolution order, later wins:
//!
//! 1. Built-in defaults (every field has one).
//! 2. The TOML file given by `--config`, if any.
//! 3. Environment variables (`DOCS_DIR`, `TOP_K`, `LLM_PROVIDER`, …).
//!
//! API keys are never read from the file; providers look them up in the
//! environment at construction time.
//!
//! ```toml
//! [corpus]
//! docs_dir = "./data/docs"
//! index_path = "./data/index.json"
//!
//! [chunking]
//! max_chars = 900
//! overlap_chars = 120
//!
//! [retrieval]
//! top_k = 5
//! min_relevance_score = 0.22
//!
//! [generation]
//! provider = "anthropic"
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use knowledge_assistant_core::{Error, Result};

use crate::prompts;

/// Largest `top_k` a caller may request.
pub const MAX_TOP_K: usize = 20;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_docs_dir")]
    pub docs_dir: PathBuf,
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            index_path: default_index_path(),
        }
    }
}

fn default_docs_dir() -> PathBuf {
    PathBuf::from("./data/docs")
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./data/index.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    900
}
fn default_overlap_chars() -> usize {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_relevance_score")]
    pub min_relevance_score: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_relevance_score: default_min_relevance_score(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_relevance_score() -> f32 {
    knowledge_assistant_core::guardrails::DEFAULT_MIN_RELEVANCE_SCORE
}

/// Retry and timeout policy shared by every outbound HTTP call.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct HttpPolicy {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_initial_backoff_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `"openai"` or `"anthropic"`.
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    /// Falls back to the provider's default model when unset.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(flatten)]
    pub http: HttpPolicy,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            http: HttpPolicy::default(),
        }
    }
}

fn default_generation_provider() -> String {
    "openai".to_string()
}
fn default_max_tokens() -> u32 {
    700
}
fn default_temperature() -> f32 {
    0.2
}

/// Embedding backend, configured independently of the generator.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"` or `"ollama"`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(flatten)]
    pub http: HttpPolicy,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            base_url: None,
            http: HttpPolicy::default(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptsConfig {
    #[serde(default = "default_template")]
    pub template: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
        }
    }
}

fn default_template() -> String {
    prompts::DEFAULT_TEMPLATE.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// `"*"` or a comma-separated list of allowed origins.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_cors_origins() -> String {
    "*".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `"json"` or `"text"`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

/// Load configuration from an optional TOML file plus the process environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Configuration(format!(
                    "failed to read config file {}: {e}",
                    path.display()
                ))
            })?;
            parse_config(&content)?
        }
        None => Config::default(),
    };

    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Parse TOML without applying environment overrides or validation.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content)
        .map_err(|e| Error::Configuration(format!("failed to parse config file: {e}")))
}

impl Config {
    /// Apply the service's environment variables on top of the loaded values.
    ///
    /// `lookup` abstracts `std::env::var` so tests can supply a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Providers first: the model and URL overrides below depend on them.
        if let Some(v) = lookup("LLM_PROVIDER") {
            self.generation.provider = v.trim().to_lowercase();
        }
        if let Some(v) = lookup("EMBEDDING_PROVIDER") {
            self.embedding.provider = v.trim().to_lowercase();
        }

        match self.generation.provider.as_str() {
            "openai" => {
                if let Some(v) = lookup("OPENAI_MODEL") {
                    self.generation.model = Some(v);
                }
                if let Some(v) = lookup("OPENAI_BASE_URL") {
                    self.generation.base_url = Some(v);
                }
            }
            "anthropic" => {
                if let Some(v) = lookup("ANTHROPIC_MODEL") {
                    self.generation.model = Some(v);
                }
                if let Some(v) = lookup("ANTHROPIC_BASE_URL") {
                    self.generation.base_url = Some(v);
                }
            }
            _ => {}
        }

        if self.embedding.provider == "openai" {
            if let Some(v) = lookup("OPENAI_EMBED_MODEL") {
                self.embedding.model = Some(v);
            }
            if let Some(v) = lookup("OPENAI_BASE_URL") {
                self.embedding.base_url = Some(v);
            }
        }

        if let Some(v) = lookup("DOCS_DIR") {
            self.corpus.docs_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("INDEX_PATH") {
            self.corpus.index_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TOP_K") {
            self.retrieval.top_k = parse_env("TOP_K", &v)?;
        }
        if let Some(v) = lookup("CHUNK_MAX_CHARS") {
            self.chunking.max_chars = parse_env("CHUNK_MAX_CHARS", &v)?;
        }
        if let Some(v) = lookup("CHUNK_OVERLAP_CHARS") {
            self.chunking.overlap_chars = parse_env("CHUNK_OVERLAP_CHARS", &v)?;
        }
        if let Some(v) = lookup("MIN_RELEVANCE_SCORE") {
            self.retrieval.min_relevance_score = parse_env("MIN_RELEVANCE_SCORE", &v)?;
        }
        if let Some(v) = lookup("PROMPT_TEMPLATE") {
            self.prompts.template = v;
        }
        if let Some(v) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = v;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.logging.level = v.trim().to_lowercase();
        }

        Ok(())
    }

    /// Check cross-field constraints. Called by [`load_config`].
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            return Err(invalid("chunking.max_chars must be > 0"));
        }
        if self.chunking.overlap_chars >= self.chunking.max_chars {
            return Err(invalid(format!(
                "chunking.overlap_chars ({}) must be smaller than chunking.max_chars ({})",
                self.chunking.overlap_chars, self.chunking.max_chars
            )));
        }

        if !(1..=MAX_TOP_K).contains(&self.retrieval.top_k) {
            return Err(invalid(format!(
                "retrieval.top_k must be in [1, {MAX_TOP_K}]"
            )));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_relevance_score) {
            return Err(invalid("retrieval.min_relevance_score must be in [-1.0, 1.0]"));
        }

        match self.generation.provider.as_str() {
            "openai" | "anthropic" => {}
            other => {
                return Err(invalid(format!(
                    "Unknown generation provider: '{other}'. Must be openai or anthropic."
                )))
            }
        }
        match self.embedding.provider.as_str() {
            "openai" | "ollama" => {}
            other => {
                return Err(invalid(format!(
                    "Unknown embedding provider: '{other}'. Must be openai or ollama."
                )))
            }
        }

        if prompts::find_template(&self.prompts.template).is_none() {
            return Err(invalid(format!(
                "Unknown prompt template: '{}'",
                self.prompts.template
            )));
        }

        match self.logging.format.as_str() {
            "json" | "text" => {}
            other => {
                return Err(invalid(format!(
                    "Unknown logging.format: '{other}'. Must be json or text."
                )))
            }
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(format!("{key} has an invalid value: '{value}'")))
}

fn invalid(message: impl Into<String>) -> Error {
    Error::Configuration(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.chunking.max_chars, 900);
        assert_eq!(config.chunking.overlap_chars, 120);
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.retrieval.min_relevance_score - 0.22).abs() < 1e-6);
        assert_eq!(config.generation.http.max_retries, 2);
        assert_eq!(config.prompts.template, "grounded_concise");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = parse_config(
            r#"
[chunking]
max_chars = 400

[embedding]
provider = "ollama"
model = "nomic-embed-text"
max_retries = 0
"#,
        )
        .unwrap();
        assert_eq!(config.chunking.max_chars, 400);
        assert_eq!(config.chunking.overlap_chars, 120);
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.http.max_retries, 0);
        assert_eq!(config.embedding.http.timeout_secs, 30);
        assert_eq!(config.generation.provider, "openai");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(env(&[
                ("LLM_PROVIDER", "Anthropic"),
                ("ANTHROPIC_MODEL", "claude-test"),
                ("OPENAI_MODEL", "ignored-for-anthropic"),
                ("OPENAI_EMBED_MODEL", "text-embedding-3-small"),
                ("DOCS_DIR", "/srv/docs"),
                ("TOP_K", "8"),
                ("MIN_RELEVANCE_SCORE", "0.1"),
            ]))
            .unwrap();

        assert_eq!(config.generation.provider, "anthropic");
        assert_eq!(config.generation.model.as_deref(), Some("claude-test"));
        assert_eq!(
            config.embedding.model.as_deref(),
            Some("text-embedding-3-small")
        );
        assert_eq!(config.corpus.docs_dir, PathBuf::from("/srv/docs"));
        assert_eq!(config.retrieval.top_k, 8);
        assert!((config.retrieval.min_relevance_score - 0.1).abs() < 1e-6);
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_numeric_env_is_configuration_error() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(env(&[("TOP_K", "five")]))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let mut config = Config::default();
        config.chunking.max_chars = 100;
        config.chunking.overlap_chars = 100;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_top_k_bounds() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
        config.retrieval.top_k = MAX_TOP_K + 1;
        assert!(config.validate().is_err());
        config.retrieval.top_k = MAX_TOP_K;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let mut config = Config::default();
        config.generation.provider = "cohere".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.embedding.provider = "anthropic".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_template_rejected() {
        let mut config = Config::default();
        config.prompts.template = "freestyle".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = load_config(Some(Path::new("/nonexistent/ka.toml"))).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
