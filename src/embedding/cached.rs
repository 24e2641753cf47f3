//! LRU-caching embedder wrapper.
//!
//! Caches text→vector lookups keyed by a hash of the normalized input.
//! The cache sits behind a mutex so the wrapper stays `Send + Sync` for
//! concurrent retrieval legs.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;

use crate::Result;
use crate::embedding::{Embedder, normalize_text};

/// Embedder wrapper with a bounded LRU cache.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: Mutex<LruCache<u64, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Hit/miss counters for the embedding cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddingCacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that fell through to the model.
    pub misses: u64,
}

impl<E: Embedder> CachedEmbedder<E> {
    /// Wraps an embedder with an LRU cache of the given capacity.
    ///
    /// A zero capacity is clamped to one entry.
    #[must_use]
    pub fn new(inner: E, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn cache_key(text: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        normalize_text(text).hash(&mut hasher);
        hasher.finish()
    }

    /// Returns cache hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> EmbeddingCacheStats {
        EmbeddingCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<E: Embedder> Embedder for CachedEmbedder<E> {
    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::cache_key(text);

        if let Ok(mut cache) = self.cache.lock()
            && let Some(cached) = cache.get(&key)
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let embedding = self.inner.embed(text)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, embedding.clone());
        }
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        // Serve cached entries, batch only the misses through the model.
        let keys: Vec<u64> = texts.iter().map(|t| Self::cache_key(t)).collect();
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

        if let Ok(mut cache) = self.cache.lock() {
            for (i, key) in keys.iter().enumerate() {
                if let Some(cached) = cache.get(key) {
                    results[i] = Some(cached.clone());
                }
            }
        }

        let miss_indices: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.is_none().then_some(i))
            .collect();
        self.hits
            .fetch_add((texts.len() - miss_indices.len()) as u64, Ordering::Relaxed);
        self.misses
            .fetch_add(miss_indices.len() as u64, Ordering::Relaxed);

        if !miss_indices.is_empty() {
            let miss_texts: Vec<&str> = miss_indices.iter().map(|&i| texts[i]).collect();
            let embeddings = self.inner.embed_batch(&miss_texts)?;
            let mut cache = self.cache.lock().map_err(|_| {
                crate::error::RetrievalError::EmbedderUnavailable {
                    reason: "embedding cache lock poisoned".to_string(),
                }
            })?;
            for (&i, embedding) in miss_indices.iter().zip(embeddings) {
                cache.put(keys[i], embedding.clone());
                results[i] = Some(embedding);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{DEFAULT_DIMENSIONS, HashedEmbedder};

    fn cached() -> CachedEmbedder<HashedEmbedder> {
        CachedEmbedder::new(HashedEmbedder::new(DEFAULT_DIMENSIONS), 8)
    }

    #[test]
    fn test_hit_after_miss() {
        let embedder = cached();
        let first = embedder.embed("vacation policy").unwrap();
        let second = embedder.embed("vacation policy").unwrap();
        assert_eq!(first, second);

        let stats = embedder.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_normalized_inputs_share_entry() {
        let embedder = cached();
        embedder.embed("Vacation Policy").unwrap();
        embedder.embed("  vacation policy  ").unwrap();

        let stats = embedder.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_capacity_evicts() {
        let embedder = CachedEmbedder::new(HashedEmbedder::new(DEFAULT_DIMENSIONS), 2);
        embedder.embed("one").unwrap();
        embedder.embed("two").unwrap();
        embedder.embed("three").unwrap(); // evicts "one"
        embedder.embed("one").unwrap();

        assert_eq!(embedder.stats().misses, 4);
    }

    #[test]
    fn test_batch_mixes_hits_and_misses() {
        let embedder = cached();
        embedder.embed("alpha").unwrap();

        let batch = embedder.embed_batch(&["alpha", "beta"]).unwrap();
        assert_eq!(batch.len(), 2);

        let stats = embedder.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_dimensions_pass_through() {
        assert_eq!(cached().dimensions(), DEFAULT_DIMENSIONS);
    }
}
