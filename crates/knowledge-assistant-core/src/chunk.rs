//! Sliding-window text chunker.
//!
//! Splits document text into overlapping [`Chunk`]s of at most `max_chars`
//! characters. Whitespace is normalized first (every run of whitespace,
//! newlines included, collapses to a single space) so that window sizes
//! reflect visible content rather than layout.
//!
//! # Algorithm
//!
//! 1. Normalize whitespace and trim both ends.
//! 2. Emit the window `[start, start + max_chars)`, clipped to the text end.
//! 3. If the window reached the end, stop.
//! 4. Otherwise the next window starts at `end - overlap` (floored at zero).
//!    When that would not move past the previous start, advance by one
//!    character instead, so the loop always terminates.
//!
//! Windows are measured in Unicode scalar values and never split a
//! multi-byte character.
//!
//! # Example
//!
//! ```rust
//! use knowledge_assistant_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("policy", "abcdefghij", 4, 1);
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, ["abcd", "defg", "ghij"]);
//! assert_eq!(chunks[2].chunk_id, "policy::c2");
//! ```

use crate::models::{chunk_id, Chunk};

/// Collapse all whitespace runs to single spaces and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` into overlapping windows.
///
/// Returns chunks with ids `"{doc_id}::c0"`, `"{doc_id}::c1"`, … in order.
/// Empty or whitespace-only text produces no chunks. A `max_chars` of zero
/// is treated as one.
pub fn chunk_text(doc_id: &str, text: &str, max_chars: usize, overlap: usize) -> Vec<Chunk> {
    let cleaned = normalize_whitespace(text);
    if cleaned.is_empty() {
        return Vec::new();
    }

    let max_chars = max_chars.max(1);

    // Byte offset of every char boundary, including the end of the string.
    let bounds: Vec<usize> = cleaned
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(cleaned.len()))
        .collect();
    let total = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + max_chars).min(total);
        chunks.push(Chunk {
            doc_id: doc_id.to_string(),
            chunk_id: chunk_id(doc_id, chunks.len()),
            text: cleaned[bounds[start]..bounds[end]].to_string(),
        });

        if end == total {
            break;
        }

        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { start + 1 };
    }

    chunks
}
