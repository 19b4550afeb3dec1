//! Fakes and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use knowledge_assistant::config::Config;
use knowledge_assistant::retriever::Retriever;
use knowledge_assistant_core::embedding::Embedder;
use knowledge_assistant_core::generation::Generator;
use knowledge_assistant_core::{Error, Result};
use tempfile::TempDir;

pub const DIMS: usize = 1024;

/// Hashes lower-cased words into a fixed number of buckets.
///
/// Texts that share words get a positive cosine score; texts with no words
/// in common score zero.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let bucket = word
            .to_lowercase()
            .bytes()
            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
            % DIMS;
        v[bucket] += 1.0;
    }
    v
}

/// Deterministic embedder that counts its batch calls.
#[derive(Default)]
pub struct BagOfWordsEmbedder {
    pub calls: AtomicUsize,
    pub texts_embedded: AtomicUsize,
    pub delay: Option<Duration>,
}

impl BagOfWordsEmbedder {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

/// Fails the first `failures` calls, then behaves like [`BagOfWordsEmbedder`].
pub struct FlakyEmbedder {
    failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FlakyEmbedder {
    pub fn new(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn model_name(&self) -> &str {
        "flaky"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::upstream("flaky", Some(503), "service unavailable"));
        }
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }
}

/// Returns one vector fewer than asked for.
pub struct ShortEmbedder;

#[async_trait]
impl Embedder for ShortEmbedder {
    fn model_name(&self) -> &str {
        "short"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().skip(1).map(|t| bag_of_words(t)).collect())
    }
}

/// Returns vectors of a different dimension than [`BagOfWordsEmbedder`].
pub struct NarrowEmbedder;

#[async_trait]
impl Embedder for NarrowEmbedder {
    fn model_name(&self) -> &str {
        "narrow"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }
}

/// Returns a one-dimensional vector for every text after the first.
pub struct RaggedEmbedder;

#[async_trait]
impl Embedder for RaggedEmbedder {
    fn model_name(&self) -> &str {
        "ragged"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .enumerate()
            .map(|(i, t)| if i == 0 { bag_of_words(t) } else { vec![1.0] })
            .collect())
    }
}

/// Records the prompts it receives and answers with a fixed string.
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<(String, String)>>,
}

pub const GENERATED_ANSWER: &str = "Escalate within 15 minutes [policy::policy::c0].";

impl RecordingGenerator {
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_user_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().map(|(_, u)| u.clone())
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        Ok(GENERATED_ANSWER.to_string())
    }
}

pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    fn model_name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
        Err(Error::upstream("failing", Some(500), "boom"))
    }
}

// ─── Fixtures ───────────────────────────────────────────────────────

pub fn test_config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.corpus.docs_dir = tmp.path().join("docs");
    config.corpus.index_path = tmp.path().join("data").join("index.json");
    config
}

pub fn write_doc(config: &Config, name: &str, text: &str) {
    let dir: &Path = &config.corpus.docs_dir;
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), text).unwrap();
}

pub fn write_policy_corpus(config: &Config) {
    write_doc(
        config,
        "policy.txt",
        "Escalate P1 incidents to on-call within 15 minutes.",
    );
    write_doc(
        config,
        "runbook.md",
        "Database failover runbook.\n\nPromote the replica, then update the connection string.",
    );
}

pub fn retriever(config: &Config, embedder: Arc<dyn Embedder>) -> Arc<Retriever> {
    Arc::new(Retriever::new(embedder, &config.corpus, &config.chunking))
}

