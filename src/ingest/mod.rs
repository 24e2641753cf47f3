//! Document ingestion pipeline.
//!
//! Loads markdown policy files, derives department metadata from the
//! filename, splits content into section-aware overlapped chunks, and
//! writes the result to the vector store and the BM25 index. Indexing is
//! atomic from the core's viewpoint: a partial failure resets the
//! collection and retries once.

mod markdown;

pub use markdown::{ROOT_SECTION, Section, clean_text, extract_sections};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::DocumentChunk;
use crate::error::{IngestError, Result};
use crate::search::Bm25Index;
use crate::vectorstore::VectorStore;

/// Pipeline for ingesting and indexing policy documents.
pub struct DocumentIngestion {
    chunk_size: usize,
    chunk_overlap: usize,
    vectorstore: Arc<VectorStore>,
    bm25: Arc<Bm25Index>,
}

impl DocumentIngestion {
    /// Creates an ingestion pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_size` is zero or the overlap is not
    /// smaller than the chunk size.
    pub fn new(
        vectorstore: Arc<VectorStore>,
        bm25: Arc<Bm25Index>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(IngestError::InvalidConfig {
                reason: "chunk_size must be > 0".to_string(),
            }
            .into());
        }
        if chunk_overlap >= chunk_size {
            return Err(IngestError::OverlapTooLarge {
                overlap: chunk_overlap,
                size: chunk_size,
            }
            .into());
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            vectorstore,
            bm25,
        })
    }

    /// Chunks one document's content into section-aware overlapped
    /// chunks. Pure: no indexing happens here.
    ///
    /// Small sections become one chunk each; large sections are packed
    /// greedily on blank-line paragraph boundaries, with the trailing
    /// `chunk_overlap` characters of the previous chunk carried into the
    /// next chunk of the same section.
    #[must_use]
    pub fn chunk_document(&self, filename: &str, content: &str) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();
        let mut ordinal = 0usize;

        for section in extract_sections(content) {
            let cleaned = clean_text(&section.content);
            if cleaned.is_empty() {
                continue;
            }
            for piece in self.chunk_section(&cleaned) {
                chunks.push(DocumentChunk::new(filename, &section.title, piece, ordinal));
                ordinal += 1;
            }
        }

        chunks
    }

    /// Splits one cleaned section body into chunk-sized pieces.
    fn chunk_section(&self, text: &str) -> Vec<String> {
        if char_len(text) <= self.chunk_size {
            return vec![text.to_string()];
        }

        // Oversized paragraphs are hard-split so that overlap carry-over
        // can never push a chunk past the size bound.
        let piece_budget = self.chunk_size.saturating_sub(self.chunk_overlap + 2).max(1);

        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim_end();
            if paragraph.trim().is_empty() {
                continue;
            }
            for piece in split_to_budget(paragraph, piece_budget) {
                if char_len(&current) + char_len(&piece) + 2 <= self.chunk_size {
                    current.push_str(&piece);
                    current.push_str("\n\n");
                } else {
                    if !current.trim().is_empty() {
                        chunks.push(current.trim().to_string());
                    }
                    let overlap = tail_chars(current.trim_end(), self.chunk_overlap);
                    current = overlap;
                    current.push_str(&piece);
                    current.push_str("\n\n");
                }
            }
        }

        if !current.trim().is_empty() {
            chunks.push(current.trim().to_string());
        }

        chunks
    }

    /// Ingests every markdown file under `path`, returning a map of
    /// filename → chunk count.
    ///
    /// Files are processed in sorted filename order so chunk ids are
    /// deterministic. Both indexes are written together: on failure the
    /// collection is reset and the whole batch retried once.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::CorpusNotFound`] for a missing or empty
    /// directory, [`IngestError::ReadFailed`] for unreadable files, and
    /// [`IngestError::IndexingFailed`] if the retry also fails.
    pub fn ingest_directory(&self, path: &Path) -> Result<BTreeMap<String, usize>> {
        let mut files: Vec<std::path::PathBuf> = std::fs::read_dir(path)
            .map_err(|_| IngestError::CorpusNotFound {
                path: path.display().to_string(),
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(IngestError::CorpusNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        info!(count = files.len(), dir = %path.display(), "ingesting policy files");

        let mut results = BTreeMap::new();
        let mut all_chunks = Vec::new();

        for file in &files {
            let filename = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let content =
                std::fs::read_to_string(file).map_err(|err| IngestError::ReadFailed {
                    path: file.display().to_string(),
                    reason: err.to_string(),
                })?;

            let chunks = self.chunk_document(&filename, &content);
            if chunks.is_empty() {
                warn!(file = %filename, "no chunks produced");
            }
            results.insert(filename, chunks.len());
            all_chunks.extend(chunks);
        }

        self.index_with_retry(&all_chunks)?;

        info!(
            chunks = all_chunks.len(),
            files = results.len(),
            "ingestion complete"
        );
        Ok(results)
    }

    /// Writes chunks to both indexes, resetting and retrying once on
    /// failure.
    fn index_with_retry(&self, chunks: &[DocumentChunk]) -> Result<()> {
        match self.index(chunks) {
            Ok(()) => Ok(()),
            Err(first_err) => {
                warn!(error = %first_err, "indexing failed, resetting collection and retrying");
                self.reset()?;
                self.index(chunks).map_err(|retry_err| {
                    IngestError::IndexingFailed {
                        reason: retry_err.to_string(),
                    }
                    .into()
                })
            }
        }
    }

    fn index(&self, chunks: &[DocumentChunk]) -> Result<()> {
        self.vectorstore.add_documents(chunks)?;
        // BM25 tracks the persisted collection, not just this batch, so
        // re-ingesting one file leaves other files searchable.
        self.bm25.rebuild(&self.vectorstore.all_chunks()?);
        Ok(())
    }

    /// Resets the collection: drops all chunks from both indexes.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector store reset fails.
    pub fn reset(&self) -> Result<()> {
        self.vectorstore.delete_collection()?;
        self.bm25.clear();
        Ok(())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Returns the final `n` characters of `text`.
fn tail_chars(text: &str, n: usize) -> String {
    let total = char_len(text);
    text.chars().skip(total.saturating_sub(n)).collect()
}

/// Splits a paragraph into pieces of at most `budget` characters.
fn split_to_budget(paragraph: &str, budget: usize) -> Vec<String> {
    if char_len(paragraph) <= budget {
        return vec![paragraph.to_string()];
    }
    let chars: Vec<char> = paragraph.chars().collect();
    chars
        .chunks(budget)
        .map(|piece| piece.iter().collect::<String>().trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Department;
    use crate::embedding::create_embedder;
    use crate::storage::SqliteStore;

    fn pipeline() -> DocumentIngestion {
        pipeline_with(120, 20)
    }

    fn pipeline_with(chunk_size: usize, overlap: usize) -> DocumentIngestion {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.init().unwrap();
        let vectorstore = Arc::new(VectorStore::new(store, create_embedder(64)));
        let bm25 = Arc::new(Bm25Index::default());
        DocumentIngestion::new(vectorstore, bm25, chunk_size, overlap).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.init().unwrap();
        let vectorstore = Arc::new(VectorStore::new(store, create_embedder(16)));
        let bm25 = Arc::new(Bm25Index::default());

        assert!(DocumentIngestion::new(Arc::clone(&vectorstore), Arc::clone(&bm25), 0, 0).is_err());
        assert!(DocumentIngestion::new(vectorstore, bm25, 50, 50).is_err());
    }

    #[test]
    fn test_small_section_is_one_chunk() {
        let pipeline = pipeline();
        let chunks = pipeline.chunk_document("hr_policies.md", "# PTO\n\nYou get 20 days.\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_id, "hr_policies.md_0");
        assert_eq!(chunks[0].section_title, "PTO");
        assert_eq!(chunks[0].department, Department::Hr);
    }

    #[test]
    fn test_large_section_splits_with_overlap() {
        let pipeline = pipeline_with(100, 20);
        let body: String = (0..8)
            .map(|i| format!("Paragraph number {i} with several words in it."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = pipeline.chunk_document("it_policies.md", &format!("# Setup\n\n{body}\n"));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.len() <= 100,
                "chunk exceeds size bound: {}",
                chunk.len()
            );
            assert_eq!(chunk.section_title, "Setup");
        }
        // Overlap: some tail of a chunk reappears at the head of the next
        let tail: String = chunks[0]
            .text
            .chars()
            .skip(chunks[0].len().saturating_sub(10))
            .collect();
        assert!(chunks[1].text.starts_with(tail.chars().next().unwrap()));
    }

    #[test]
    fn test_ordinals_continuous_across_sections() {
        let pipeline = pipeline();
        let content = "# First\n\nAlpha body text.\n\n# Second\n\nBeta body text.\n";
        let chunks = pipeline.chunk_document("welcome.md", content);
        let ordinals: Vec<usize> = chunks.iter().map(|c| c.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1]);
        assert_eq!(chunks[1].chunk_id, "welcome.md_1");
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        let pipeline = pipeline();
        assert!(pipeline.chunk_document("empty.md", "").is_empty());
        assert!(pipeline.chunk_document("blank.md", "\n\n\n").is_empty());
    }

    #[test]
    fn test_headerless_document_uses_root_section() {
        let pipeline = pipeline();
        let chunks = pipeline.chunk_document("notes.md", "Plain text without headers.\n");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_title, ROOT_SECTION);
    }

    #[test]
    fn test_chunking_deterministic() {
        let pipeline = pipeline();
        let content = "# A\n\nSome body.\n\n# B\n\nMore body.\n";
        let first = pipeline.chunk_document("hr_policies.md", content);
        let second = pipeline.chunk_document("hr_policies.md", content);
        assert_eq!(first, second);
    }

    #[test]
    fn test_ingest_directory_missing() {
        let pipeline = pipeline();
        let result = pipeline.ingest_directory(Path::new("/nonexistent/policies"));
        assert!(matches!(
            result,
            Err(crate::Error::Ingest(IngestError::CorpusNotFound { .. }))
        ));
    }

    #[test]
    fn test_ingest_directory_empty() {
        let pipeline = pipeline();
        let dir = tempfile::tempdir().unwrap();
        let result = pipeline.ingest_directory(dir.path());
        assert!(matches!(
            result,
            Err(crate::Error::Ingest(IngestError::CorpusNotFound { .. }))
        ));
    }

    #[test]
    fn test_ingest_directory_end_to_end() {
        let pipeline = pipeline();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("hr_policies.md"),
            "# PTO Policy\n\nTwenty days of vacation.\n\n# Benefits\n\nHealth insurance.\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("it_policies.md"),
            "# VPN Setup\n\nInstall the client.\n",
        )
        .unwrap();

        let results = pipeline.ingest_directory(dir.path()).unwrap();
        assert_eq!(results.get("hr_policies.md"), Some(&2));
        assert_eq!(results.get("it_policies.md"), Some(&1));
        assert_eq!(pipeline.vectorstore.count().unwrap(), 3);
        assert_eq!(pipeline.bm25.len(), 3);
    }

    #[test]
    fn test_ingest_idempotent_chunk_ids() {
        let pipeline = pipeline();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("hr_policies.md"),
            "# PTO\n\nVacation details here.\n",
        )
        .unwrap();

        pipeline.ingest_directory(dir.path()).unwrap();
        let first: Vec<String> = pipeline
            .vectorstore
            .all_chunks()
            .unwrap()
            .into_iter()
            .map(|c| c.chunk_id)
            .collect();

        pipeline.ingest_directory(dir.path()).unwrap();
        let second: Vec<String> = pipeline
            .vectorstore
            .all_chunks()
            .unwrap()
            .into_iter()
            .map(|c| c.chunk_id)
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_reset_clears_both_indexes() {
        let pipeline = pipeline();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("welcome.md"), "# Hi\n\nWelcome aboard.\n").unwrap();
        pipeline.ingest_directory(dir.path()).unwrap();

        pipeline.reset().unwrap();
        assert_eq!(pipeline.vectorstore.count().unwrap(), 0);
        assert!(pipeline.bm25.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn chunk_size_bound_holds(body in "[a-z \n]{0,2000}") {
                let pipeline = pipeline_with(100, 20);
                let content = format!("# Section\n\n{body}");
                for chunk in pipeline.chunk_document("hr_policies.md", &content) {
                    prop_assert!(chunk.len() <= 100);
                }
            }

            #[test]
            fn chunk_ids_unique(body in "[a-z \n]{0,2000}") {
                let pipeline = pipeline_with(100, 20);
                let content = format!("# A\n\n{body}\n\n# B\n\n{body}");
                let chunks = pipeline.chunk_document("it_policies.md", &content);
                let mut ids: Vec<String> =
                    chunks.iter().map(|c| c.chunk_id.clone()).collect();
                ids.sort();
                ids.dedup();
                prop_assert_eq!(ids.len(), chunks.len());
            }
        }
    }

    #[test]
    fn test_split_to_budget() {
        let pieces = split_to_budget("abcdefghij", 4);
        assert!(pieces.iter().all(|p| p.chars().count() <= 4));
        assert_eq!(pieces.join(""), "abcdefghij");
    }

    #[test]
    fn test_tail_chars() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("ab", 5), "ab");
    }
}
