//! Embedding generation for semantic retrieval.
//!
//! Provides the [`Embedder`] seam the vector store and caches depend on,
//! a deterministic hash-based implementation, and an LRU-caching wrapper.
//! The embedding model itself is a pluggable collaborator; the hash
//! embedder keeps the pipeline fully functional without one.

mod cached;
mod hashed;

pub use cached::{CachedEmbedder, EmbeddingCacheStats};
pub use hashed::HashedEmbedder;

use crate::Result;

/// Default embedding dimensions.
///
/// This is the authoritative source for embedding dimensions across the
/// codebase. The vector store and the semantic cache tier both rely on it.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Trait for embedding generators.
///
/// Implementations must be thread-safe (`Send + Sync`): embeddings are
/// generated concurrently during ingestion and inside the hybrid search
/// legs. Input is normalized (lowercased, trimmed) before encoding so
/// that trivially different spellings of a query share a vector.
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Generates an embedding for the given text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::RetrievalError::EmbedderUnavailable`] if
    /// the backing model cannot be used.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generates embeddings for multiple texts.
    ///
    /// The default implementation calls `embed` for each text
    /// sequentially. Implementations may override this for batch
    /// optimization.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding generation fails for any text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Lowercases and trims text before embedding or cache-keying.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Creates the default embedder: the deterministic hash embedder wrapped
/// in an LRU cache of the given capacity.
#[must_use]
pub fn create_embedder(cache_capacity: usize) -> std::sync::Arc<dyn Embedder> {
    std::sync::Arc::new(CachedEmbedder::new(
        HashedEmbedder::new(DEFAULT_DIMENSIONS),
        cache_capacity,
    ))
}

/// Computes cosine similarity between two embedding vectors.
///
/// Returns a value between -1.0 (opposite) and 1.0 (identical).
/// Returns 0.0 if vectors have different lengths or zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Converts a cosine similarity to the cosine distance the vector store
/// reports (smaller = closer).
#[must_use]
pub fn cosine_distance(similarity: f32) -> f32 {
    1.0 - similarity
}
