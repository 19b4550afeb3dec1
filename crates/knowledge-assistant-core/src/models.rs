//! Core data types flowing through indexing and retrieval.

use serde::{Deserialize, Serialize};

/// A contiguous window of a document's normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_id: String,
    /// `"{doc_id}::c{index}"`, unique within the document.
    pub chunk_id: String,
    pub text: String,
}

impl Chunk {
    /// Attach an embedding vector, producing an index entry.
    pub fn with_vector(self, vector: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            doc_id: self.doc_id,
            chunk_id: self.chunk_id,
            text: self.text,
            vector,
        }
    }
}

/// A chunk plus its embedding, as stored in the index file.
///
/// The on-disk record has exactly these four fields; unknown fields are
/// rejected so that a stale index from another layout is detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexedChunk {
    pub doc_id: String,
    pub chunk_id: String,
    pub text: String,
    pub vector: Vec<f32>,
}

/// An index entry paired with its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: IndexedChunk,
    pub score: f32,
}

/// Build the chunk identifier for the `index`-th window of `doc_id`.
pub fn chunk_id(doc_id: &str, index: usize) -> String {
    format!("{doc_id}::c{index}")
}

/// Recover the sequence index from a chunk id produced by [`chunk_id`].
pub fn chunk_index(chunk_id: &str) -> Option<usize> {
    let (_, suffix) = chunk_id.rsplit_once("::c")?;
    suffix.parse().ok()
}
