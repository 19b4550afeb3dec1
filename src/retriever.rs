//! Lazy index warmup and brute-force semantic search.
//!
//! A [`Retriever`] starts **cold**. The first call to [`Retriever::warmup`]
//! (or [`Retriever::search`]) either loads the index file or, when it does
//! not exist, builds it from the documents directory:
//!
//! ```text
//! docs_dir ──▶ build_chunks ──▶ Embedder::embed (one batch) ──▶ save_index
//!                                                                  │
//! index_path ──────────────── load_index ─────────────────────────┤
//!                                                                  ▼
//!                                                       Arc<Vec<IndexedChunk>>
//! ```
//!
//! Warmup is single-flight: concurrent callers wait on the same attempt and
//! the corpus is embedded at most once. A failed attempt leaves the
//! retriever cold, with nothing partial in memory, and the next caller
//! tries again. Once warm the index is immutable and read without locks.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::OnceCell;
use tracing::{debug, info};

use knowledge_assistant_core::embedding::{embed_query, Embedder};
use knowledge_assistant_core::models::{IndexedChunk, ScoredChunk};
use knowledge_assistant_core::search::rank;
use knowledge_assistant_core::{Error, Result};

use crate::config::{ChunkingConfig, CorpusConfig};
use crate::index_store::{build_chunks, load_index, save_index, uniform_dimension};

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    docs_dir: PathBuf,
    index_path: PathBuf,
    max_chars: usize,
    overlap_chars: usize,
    index: OnceCell<Arc<Vec<IndexedChunk>>>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        corpus: &CorpusConfig,
        chunking: &ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            docs_dir: corpus.docs_dir.clone(),
            index_path: corpus.index_path.clone(),
            max_chars: chunking.max_chars,
            overlap_chars: chunking.overlap_chars,
            index: OnceCell::new(),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn is_warm(&self) -> bool {
        self.index.initialized()
    }

    /// Number of indexed chunks, or `None` while cold.
    pub fn len(&self) -> Option<usize> {
        self.index.get().map(|items| items.len())
    }

    /// Load or build the index. A no-op once warm.
    pub async fn warmup(&self) -> Result<()> {
        self.ensure_index().await.map(|_| ())
    }

    async fn ensure_index(&self) -> Result<Arc<Vec<IndexedChunk>>> {
        let index = self
            .index
            .get_or_try_init(|| async { self.load_or_build().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(index))
    }

    async fn load_or_build(&self) -> Result<Vec<IndexedChunk>> {
        let start = Instant::now();

        if tokio::fs::try_exists(&self.index_path).await? {
            let items = load_index(&self.index_path).await?;
            info!(
                event = "index_loaded",
                path = %self.index_path.display(),
                chunks = items.len(),
                latency_ms = start.elapsed().as_millis() as u64,
                "index loaded"
            );
            return Ok(items);
        }

        let docs_dir = self.docs_dir.clone();
        let (max_chars, overlap) = (self.max_chars, self.overlap_chars);
        let chunks = tokio::task::spawn_blocking(move || build_chunks(&docs_dir, max_chars, overlap))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        let vectors = if chunks.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            self.embedder.embed(&texts).await?
        };

        if vectors.len() != chunks.len() {
            return Err(Error::upstream(
                self.embedder.model_name(),
                None,
                format!(
                    "expected {} embeddings, received {}",
                    chunks.len(),
                    vectors.len()
                ),
            ));
        }

        uniform_dimension(vectors.iter().map(|v| v.as_slice())).map_err(|msg| {
            Error::upstream(
                self.embedder.model_name(),
                None,
                format!("inconsistent embeddings: {msg}"),
            )
        })?;

        let items: Vec<IndexedChunk> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| chunk.with_vector(vector))
            .collect();

        save_index(&self.index_path, &items).await?;
        info!(
            event = "index_built",
            path = %self.index_path.display(),
            chunks = items.len(),
            model = self.embedder.model_name(),
            latency_ms = start.elapsed().as_millis() as u64,
            "index built"
        );
        Ok(items)
    }

    /// Return the `top_k` chunks most similar to `query`, best first.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        let index = self.ensure_index().await?;
        if top_k == 0 || index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        let expected = index[0].vector.len();
        if query_vec.len() != expected {
            return Err(Error::DataCorruption(format!(
                "query embedding has {} dimensions but the index has {expected}; \
                 rebuild the index for model {}",
                query_vec.len(),
                self.embedder.model_name()
            )));
        }

        let results = rank(&query_vec, &index, top_k);
        debug!(
            top_k,
            results = results.len(),
            top_score = results.first().map(|r| r.score).unwrap_or(0.0),
            "search complete"
        );
        Ok(results)
    }
}
