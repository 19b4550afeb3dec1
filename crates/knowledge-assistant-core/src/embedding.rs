//! Embedding gateway trait and vector similarity.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus [`cosine_similarity`], the only distance used by the retriever.
//!
//! Concrete providers (OpenAI, Ollama) live in the `knowledge-assistant`
//! app crate.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Added to the norm product so zero vectors score `0.0` instead of NaN.
pub const COSINE_EPSILON: f64 = 1e-12;

/// Converts texts to fixed-length vectors.
///
/// Implementations must return exactly one vector per input text, in input
/// order; the retriever zips results with chunks positionally.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-large"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
///
/// Convenience wrapper around [`Embedder::embed`] for one-off queries.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embedder
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::upstream(embedder.model_name(), None, "empty embedding response"))
}

/// Compute cosine similarity between two embedding vectors.
///
/// ```text
///               a · b
/// cos(θ) = ─────────────────
///          ‖a‖ × ‖b‖ + 1e-12
/// ```
///
/// Nominally in `[-1.0, 1.0]`. Zero-magnitude inputs give `0.0`, never NaN.
/// Both slices must have the same length; extra trailing elements of the
/// longer one are ignored.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt() + COSINE_EPSILON;
    (dot / denom) as f32
}
