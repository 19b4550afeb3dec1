//! Brute-force similarity ranking.
//!
//! Every indexed chunk is scored against the query vector with
//! [`cosine_similarity`]; the scan is `O(n · d)` per query and is meant for
//! corpora of hundreds to low thousands of chunks.
//!
//! Ordering: score descending; equal scores keep their index order, so
//! results are deterministic for a given index.

use std::cmp::Ordering;

use crate::embedding::cosine_similarity;
use crate::models::{IndexedChunk, ScoredChunk};

/// Score all `items` against `query` and return the best `top_k`.
///
/// `top_k == 0` returns an empty vector; `top_k` larger than the index
/// returns every item, sorted.
pub fn rank(query: &[f32], items: &[IndexedChunk], top_k: usize) -> Vec<ScoredChunk> {
    if top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(usize, f32)> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (i, cosine_similarity(query, &item.vector)))
        .collect();

    // `sort_by` is stable, so ties stay in index order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);

    scored
        .into_iter()
        .map(|(i, score)| ScoredChunk {
            chunk: items[i].clone(),
            score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, vector: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            doc_id: "doc".to_string(),
            chunk_id: id.to_string(),
            text: format!("text of {id}"),
            vector,
        }
    }

    fn sample() -> Vec<IndexedChunk> {
        vec![
            item("doc::c0", vec![0.1, 0.9]),
            item("doc::c1", vec![0.9, 0.0]),
            item("doc::c2", vec![0.8, 0.2]),
            item("doc::c3", vec![-1.0, 0.0]),
        ]
    }

    #[test]
    fn test_sorted_descending() {
        let results = rank(&[1.0, 0.0], &sample(), 10);
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, ["doc::c1", "doc::c2", "doc::c0", "doc::c3"]);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_length_is_min_of_top_k_and_size() {
        let items = sample();
        for k in 0..7 {
            assert_eq!(rank(&[1.0, 0.0], &items, k).len(), k.min(items.len()));
        }
    }

    #[test]
    fn test_zero_top_k_is_empty() {
        assert!(rank(&[1.0, 0.0], &sample(), 0).is_empty());
    }

    #[test]
    fn test_empty_index() {
        assert!(rank(&[1.0, 0.0], &[], 5).is_empty());
    }

    #[test]
    fn test_ties_keep_index_order() {
        let items = vec![
            item("a::c0", vec![1.0, 1.0]),
            item("b::c0", vec![2.0, 2.0]),
            item("c::c0", vec![0.5, 0.5]),
        ];
        let results = rank(&[1.0, 1.0], &items, 3);
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.chunk_id.as_str()).collect();
        assert_eq!(ids, ["a::c0", "b::c0", "c::c0"]);
    }
}
