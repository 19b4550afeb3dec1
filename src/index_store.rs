//! On-disk index: document scanning, chunking, and the flat JSON file.
//!
//! The index file is a single JSON array whose items have exactly the
//! fields `doc_id`, `chunk_id`, `text` and `vector`. There is no header or
//! version tag; changing [`IndexedChunk`] invalidates existing files, which
//! must then be deleted and rebuilt.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use knowledge_assistant_core::chunk::chunk_text;
use knowledge_assistant_core::models::{Chunk, IndexedChunk};
use knowledge_assistant_core::{Error, Result};

pub use knowledge_assistant_core::embedding::cosine_similarity;

/// File extensions treated as plain-text documents.
pub const DOC_EXTENSIONS: &[&str] = &["txt", "md"];

/// Read every document directly inside `docs_dir` and chunk it.
///
/// The scan is not recursive. Documents are processed in `doc_id` order so
/// the resulting chunk sequence is reproducible across platforms. When two
/// files share a stem (`faq.txt`, `faq.md`) the first by file name wins and
/// the other is skipped with a warning, keeping chunk ids unique.
pub fn build_chunks(docs_dir: &Path, max_chars: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if !docs_dir.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("documents directory not found: {}", docs_dir.display()),
        )));
    }

    let walker = WalkDir::new(docs_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    let mut docs: Vec<(String, String)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let recognized = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| DOC_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if !recognized {
            continue;
        }

        let Some(doc_id) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        if !seen.insert(doc_id.clone()) {
            warn!(doc_id = %doc_id, path = %path.display(), "duplicate document id, skipping");
            continue;
        }

        let text = std::fs::read_to_string(path)?;
        docs.push((doc_id, text));
    }

    docs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut chunks = Vec::new();
    for (doc_id, text) in &docs {
        let doc_chunks = chunk_text(doc_id, text, max_chars, overlap);
        debug!(doc_id = %doc_id, chunks = doc_chunks.len(), "chunked document");
        chunks.extend(doc_chunks);
    }

    Ok(chunks)
}

/// Write the index as one JSON array, creating parent directories.
///
/// This is a whole-file overwrite; it is neither atomic nor incremental.
pub async fn save_index(path: &Path, items: &[IndexedChunk]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let payload = serde_json::to_vec(items)
        .map_err(|e| Error::DataCorruption(format!("failed to serialize index: {e}")))?;
    tokio::fs::write(path, payload).await?;
    Ok(())
}

/// Check that every vector is non-empty and of one length.
///
/// Returns the shared dimension (`None` for no vectors) or a description of
/// the first offending vector.
pub fn uniform_dimension<'a, I>(vectors: I) -> std::result::Result<Option<usize>, String>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut dims: Option<usize> = None;
    for (i, vector) in vectors.into_iter().enumerate() {
        if vector.is_empty() {
            return Err(format!("vector {i} is empty"));
        }
        match dims {
            None => dims = Some(vector.len()),
            Some(d) if d != vector.len() => {
                return Err(format!(
                    "vector {i} has {} dimensions, expected {d}",
                    vector.len()
                ));
            }
            Some(_) => {}
        }
    }
    Ok(dims)
}

/// Read the index written by [`save_index`].
///
/// A missing, unreadable or malformed file, an item with missing or unknown
/// fields, a repeated chunk id, or vectors of differing length are all
/// reported as [`Error::DataCorruption`]. Parsing runs on the blocking pool.
pub async fn load_index(path: &Path) -> Result<Vec<IndexedChunk>> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        Error::DataCorruption(format!("cannot read index file {}: {e}", path.display()))
    })?;
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || parse_index(&bytes, &owned))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

fn parse_index(bytes: &[u8], path: &Path) -> Result<Vec<IndexedChunk>> {
    let items: Vec<IndexedChunk> = serde_json::from_slice(bytes).map_err(|e| {
        Error::DataCorruption(format!("malformed index file {}: {e}", path.display()))
    })?;

    let mut ids = HashSet::with_capacity(items.len());
    for item in &items {
        if !ids.insert(item.chunk_id.as_str()) {
            return Err(Error::DataCorruption(format!(
                "duplicate chunk id in {}: {}",
                path.display(),
                item.chunk_id
            )));
        }
    }

    uniform_dimension(items.iter().map(|item| item.vector.as_slice())).map_err(|msg| {
        Error::DataCorruption(format!("inconsistent vectors in {}: {msg}", path.display()))
    })?;

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn item(doc: &str, idx: usize, vector: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            doc_id: doc.to_string(),
            chunk_id: format!("{doc}::c{idx}"),
            text: format!("{doc} chunk {idx}"),
            vector,
        }
    }

    #[test]
    fn test_build_chunks_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        fs::write(dir.join("zeta.txt"), "Zeta document.").unwrap();
        fs::write(dir.join("alpha.md"), "Alpha\n\ndocument.").unwrap();
        fs::write(dir.join("image.png"), "not text").unwrap();
        fs::create_dir(dir.join("nested")).unwrap();
        fs::write(dir.join("nested").join("inner.txt"), "ignored").unwrap();

        let chunks = build_chunks(dir, 900, 120).unwrap();
        let ids: Vec<&str> = chunks.iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids, ["alpha::c0", "zeta::c0"]);
        assert_eq!(chunks[0].text, "Alpha document.");
    }

    #[test]
    fn test_build_chunks_skips_duplicate_stems() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("faq.md"), "markdown faq").unwrap();
        fs::write(tmp.path().join("faq.txt"), "text faq").unwrap();

        let chunks = build_chunks(tmp.path(), 900, 120).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "markdown faq");
    }

    #[test]
    fn test_build_chunks_empty_document_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("blank.txt"), "\n\n   \n").unwrap();
        assert!(build_chunks(tmp.path(), 900, 120).unwrap().is_empty());
    }

    #[test]
    fn test_build_chunks_missing_dir() {
        let tmp = TempDir::new().unwrap();
        let err = build_chunks(&tmp.path().join("missing"), 900, 120).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("dir").join("index.json");
        let items = vec![
            item("policy", 0, vec![0.25, -1.5, 3.0]),
            item("policy", 1, vec![0.0, 0.0, 0.0]),
            item("runbook", 0, vec![1e-7, 2.5e3, -0.125]),
        ];

        save_index(&path, &items).await.unwrap();
        let loaded = load_index(&path).await.unwrap();
        assert_eq!(loaded, items);
    }

    #[tokio::test]
    async fn test_file_has_exactly_four_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        save_index(&path, &[item("a", 0, vec![1.0])]).await.unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        let obj = raw[0].as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(keys, ["chunk_id", "doc_id", "text", "vector"]);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_corruption() {
        let tmp = TempDir::new().unwrap();
        let err = load_index(&tmp.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, Error::DataCorruption(_)));
    }

    #[tokio::test]
    async fn test_load_malformed_file_is_corruption() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");

        for body in [
            "not json",
            r#"{"doc_id": "a"}"#,
            r#"[{"doc_id": "a", "chunk_id": "a::c0", "text": "t"}]"#,
            r#"[{"doc_id": "a", "chunk_id": "a::c0", "text": "t", "vector": ["x"]}]"#,
        ] {
            fs::write(&path, body).unwrap();
            let err = load_index(&path).await.unwrap_err();
            assert!(matches!(err, Error::DataCorruption(_)), "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_load_rejects_duplicate_chunk_ids() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        save_index(&path, &[item("a", 0, vec![1.0]), item("a", 0, vec![2.0])])
            .await
            .unwrap();
        assert!(matches!(
            load_index(&path).await,
            Err(Error::DataCorruption(_))
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_mixed_vector_lengths() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        save_index(
            &path,
            &[item("a", 0, vec![0.0, 1.0, 0.0]), item("b", 0, vec![1.0])],
        )
        .await
        .unwrap();

        let err = load_index(&path).await.unwrap_err();
        assert!(matches!(err, Error::DataCorruption(ref m) if m.contains("dimensions")));
    }

    #[tokio::test]
    async fn test_load_rejects_empty_vector() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        save_index(&path, &[item("a", 0, vec![]), item("b", 0, vec![])])
            .await
            .unwrap();

        let err = load_index(&path).await.unwrap_err();
        assert!(matches!(err, Error::DataCorruption(ref m) if m.contains("empty")));
    }

    #[test]
    fn test_uniform_dimension() {
        let empty: [&[f32]; 0] = [];
        assert_eq!(uniform_dimension(empty), Ok(None));
        assert_eq!(
            uniform_dimension([[1.0f32, 2.0].as_slice(), [3.0, 4.0].as_slice()]),
            Ok(Some(2))
        );
        assert!(uniform_dimension([[1.0f32, 2.0].as_slice(), [3.0].as_slice()]).is_err());
    }
}
