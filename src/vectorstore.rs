//! Embedded cosine-similarity vector store.
//!
//! Persistent store over sqlite with a metadata filter on `department`.
//! Results are ordered by ascending cosine distance (smaller = closer).
//! At corpus scale (≤10⁴ chunks) a parallel linear scan outperforms the
//! bookkeeping of an approximate index.

use std::sync::Arc;

use rayon::prelude::*;

use crate::Result;
use crate::core::{Department, DocumentChunk};
use crate::embedding::{Embedder, cosine_distance, cosine_similarity};
use crate::storage::SqliteStore;

/// A chunk scored by cosine distance to a query vector.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    /// The matched chunk.
    pub chunk: DocumentChunk,
    /// Cosine distance to the query (smaller = closer).
    pub distance: f32,
}

/// Persistent cosine-similarity index over the chunk collection.
pub struct VectorStore {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
}

impl VectorStore {
    /// Creates a vector store over the given storage and embedder.
    #[must_use]
    pub fn new(store: Arc<SqliteStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Embeds and persists a batch of chunks.
    ///
    /// Duplicate `chunk_id`s overwrite previous rows.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the storage transaction fails.
    pub fn add_documents(&self, chunks: &[DocumentChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts)?;
        self.store.upsert_chunks(chunks, &embeddings)?;
        Ok(())
    }

    /// Queries by text: embeds the query and delegates to
    /// [`Self::query_vector`].
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or the scan fails.
    pub fn query(
        &self,
        query_text: &str,
        k: usize,
        department: Option<Department>,
    ) -> Result<Vec<ScoredChunk>> {
        let query_vector = self.embedder.embed(query_text)?;
        self.query_vector(&query_vector, k, department)
    }

    /// Returns the `k` chunks closest to the query vector, ordered by
    /// ascending cosine distance, optionally filtered by department.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage scan fails.
    pub fn query_vector(
        &self,
        query_vector: &[f32],
        k: usize,
        department: Option<Department>,
    ) -> Result<Vec<ScoredChunk>> {
        let rows = self.store.chunks_with_embeddings(department)?;
        if rows.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredChunk> = rows
            .into_par_iter()
            .map(|(chunk, embedding)| ScoredChunk {
                distance: cosine_distance(cosine_similarity(query_vector, &embedding)),
                chunk,
            })
            .collect();

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Returns every chunk in the collection, ordered by filename then
    /// ordinal.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read fails.
    pub fn all_chunks(&self) -> Result<Vec<DocumentChunk>> {
        self.store.all_chunks()
    }

    /// Deletes the whole collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_collection(&self) -> Result<()> {
        self.store.reset_collection()
    }

    /// Returns the number of chunks in the collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the count query fails.
    pub fn count(&self) -> Result<usize> {
        self.store.chunk_count()
    }

    /// The embedder backing this store.
    #[must_use]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::create_embedder;

    fn vector_store() -> VectorStore {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.init().unwrap();
        VectorStore::new(store, create_embedder(64))
    }

    fn sample_chunks() -> Vec<DocumentChunk> {
        vec![
            DocumentChunk::new(
                "hr_policies.md",
                "PTO Policy",
                "Employees receive twenty days of paid vacation time each year",
                0,
            ),
            DocumentChunk::new(
                "it_policies.md",
                "VPN Setup",
                "Install the VPN client and sign in with your corporate account",
                0,
            ),
            DocumentChunk::new(
                "finance_policies.md",
                "Expenses",
                "Submit expense reports within thirty days of purchase",
                0,
            ),
        ]
    }

    #[test]
    fn test_add_and_count() {
        let vs = vector_store();
        vs.add_documents(&sample_chunks()).unwrap();
        assert_eq!(vs.count().unwrap(), 3);
    }

    #[test]
    fn test_query_orders_by_distance() {
        let vs = vector_store();
        vs.add_documents(&sample_chunks()).unwrap();

        let results = vs.query("paid vacation time days", 3, None).unwrap();
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
        assert_eq!(results[0].chunk.filename, "hr_policies.md");
    }

    #[test]
    fn test_query_department_filter() {
        let vs = vector_store();
        vs.add_documents(&sample_chunks()).unwrap();

        let results = vs
            .query("vacation days", 5, Some(Department::It))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.department, Department::It);
    }

    #[test]
    fn test_query_empty_collection() {
        let vs = vector_store();
        assert!(vs.query("anything", 5, None).unwrap().is_empty());
    }

    #[test]
    fn test_delete_collection() {
        let vs = vector_store();
        vs.add_documents(&sample_chunks()).unwrap();
        vs.delete_collection().unwrap();
        assert_eq!(vs.count().unwrap(), 0);
    }

    #[test]
    fn test_add_empty_is_noop() {
        let vs = vector_store();
        vs.add_documents(&[]).unwrap();
        assert_eq!(vs.count().unwrap(), 0);
    }
}
