//! Two-tier answer cache: exact hash lookup layered over semantic
//! similarity.
//!
//! Tier 1 keys on the SHA-256 of the normalized query. Tier 2 runs only
//! when tier 1 misses and an embedder is available: it scans the most
//! recent valid embedded entries for a cosine match above the
//! similarity threshold. Writes go through a background worker
//! ([`writer::CacheWriter`]); reads treat backend failures as misses.

mod writer;

pub use writer::{CacheWriter, WriteJob};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::ChunkSource;
use crate::embedding::{Embedder, cosine_similarity};
use crate::error::CacheError;
use crate::storage::SqliteStore;

/// Upper bound on entries scanned by the semantic tier per lookup.
const SEMANTIC_SCAN_LIMIT: usize = 100;

/// Which tier served a cache hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// Exact normalized-query hash match.
    Exact,
    /// Cosine-similarity match on the query embedding.
    Semantic,
}

impl CacheTier {
    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Semantic => "semantic",
        }
    }
}

/// A cached answer returned on a hit.
#[derive(Debug, Clone)]
pub struct CachedAnswer {
    /// The cached response markdown.
    pub response: String,
    /// The cached citations.
    pub sources: Vec<ChunkSource>,
    /// Department label recorded at write time.
    pub department: Option<String>,
    /// 1.0 for exact hits; the cosine similarity for semantic hits.
    pub confidence: f32,
    /// Which tier matched.
    pub cache_type: CacheTier,
}

/// Two-tier answer cache over the sqlite store.
pub struct TwoTierCache {
    store: Arc<SqliteStore>,
    embedder: Option<Arc<dyn Embedder>>,
    similarity_threshold: f32,
    ttl_hours: i64,
}

impl TwoTierCache {
    /// Creates a cache. Passing no embedder disables the semantic tier.
    #[must_use]
    pub fn new(
        store: Arc<SqliteStore>,
        embedder: Option<Arc<dyn Embedder>>,
        similarity_threshold: f32,
        ttl_hours: i64,
    ) -> Self {
        Self {
            store,
            embedder,
            similarity_threshold,
            ttl_hours,
        }
    }

    fn normalize(query: &str) -> String {
        query.trim().to_lowercase()
    }

    /// SHA-256 hex digest of the normalized query.
    #[must_use]
    pub fn query_hash(query: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(Self::normalize(query).as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }

    fn query_embedding(&self, query: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(&Self::normalize(query)) {
            Ok(embedding) => Some(embedding),
            Err(err) => {
                warn!(error = %err, "query embedding failed, semantic tier skipped");
                None
            }
        }
    }

    /// Looks up a cached answer. Backend failures log at warn and
    /// behave as a miss.
    #[must_use]
    pub fn get(&self, query: &str) -> Option<CachedAnswer> {
        let now = chrono::Utc::now().timestamp();
        let hash = Self::query_hash(query);

        // Tier 1: exact
        match self.store.cache_get_exact(&hash, now) {
            Ok(Some(record)) => {
                if let Err(err) = self.store.cache_touch(record.id, now) {
                    warn!(error = %err, "cache touch failed");
                }
                debug!(tier = "exact", "answer cache hit");
                return Some(CachedAnswer {
                    response: record.response,
                    sources: record.sources,
                    department: record.department,
                    confidence: 1.0,
                    cache_type: CacheTier::Exact,
                });
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "cache read failed, treating as miss");
                return None;
            }
        }

        // Tier 2: semantic
        let query_embedding = self.query_embedding(query)?;
        let candidates = match self.store.cache_recent_embedded(SEMANTIC_SCAN_LIMIT, now) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = %err, "semantic cache scan failed, treating as miss");
                return None;
            }
        };

        let mut best: Option<(f32, crate::storage::CacheRecord)> = None;
        for candidate in candidates {
            let Some(ref embedding) = candidate.query_embedding else {
                continue;
            };
            let similarity = cosine_similarity(&query_embedding, embedding);
            if similarity >= self.similarity_threshold
                && best.as_ref().is_none_or(|(s, _)| similarity > *s)
            {
                best = Some((similarity, candidate));
            }
        }

        let (similarity, record) = best?;
        if let Err(err) = self.store.cache_touch(record.id, now) {
            warn!(error = %err, "cache touch failed");
        }
        debug!(tier = "semantic", similarity, "answer cache hit");
        Some(CachedAnswer {
            response: record.response,
            sources: record.sources,
            department: record.department,
            confidence: similarity,
            cache_type: CacheTier::Semantic,
        })
    }

    /// Writes an answer synchronously. The orchestrator goes through
    /// the background writer instead; this is the worker's entry point.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the write fails.
    pub fn put(
        &self,
        query: &str,
        response: &str,
        sources: &[ChunkSource],
        department: Option<&str>,
        confidence: f32,
    ) -> Result<(), CacheError> {
        let now = chrono::Utc::now().timestamp();
        let expires_at = now + self.ttl_hours * 3600;
        let embedding = self.query_embedding(query);

        self.store
            .cache_upsert(
                &Self::query_hash(query),
                query,
                embedding.as_deref(),
                response,
                sources,
                department,
                Some(confidence),
                now,
                expires_at,
            )
            .map_err(|err| CacheError::Backend(err.to_string()))
    }

    /// Soft-invalidates entries, optionally only for one department.
    /// Readers honor the flag immediately; cleanup removes the rows.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the update fails.
    pub fn invalidate(&self, department: Option<&str>) -> Result<usize, CacheError> {
        self.store
            .cache_invalidate(department)
            .map_err(|err| CacheError::Backend(err.to_string()))
    }

    /// Deletes expired and invalidated entries.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the delete fails.
    pub fn cleanup_expired(&self) -> Result<usize, CacheError> {
        self.store
            .cache_cleanup_expired(chrono::Utc::now().timestamp())
            .map_err(|err| CacheError::Backend(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Department;
    use crate::embedding::create_embedder;

    fn store() -> Arc<SqliteStore> {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.init().unwrap();
        store
    }

    fn cache() -> TwoTierCache {
        TwoTierCache::new(store(), Some(create_embedder(64)), 0.92, 24)
    }

    fn sample_sources() -> Vec<ChunkSource> {
        vec![ChunkSource {
            document: "hr_policies.md".to_string(),
            section: "PTO Policy".to_string(),
            department: Department::Hr,
        }]
    }

    #[test]
    fn test_exact_hit_roundtrip() {
        let cache = cache();
        cache
            .put(
                "How much PTO do I get?",
                "Twenty days.",
                &sample_sources(),
                Some("HR"),
                0.9,
            )
            .unwrap();

        let hit = cache.get("How much PTO do I get?").unwrap();
        assert_eq!(hit.response, "Twenty days.");
        assert_eq!(hit.cache_type, CacheTier::Exact);
        assert!((hit.confidence - 1.0).abs() < f32::EPSILON);
        assert_eq!(hit.sources.len(), 1);
        assert_eq!(hit.department.as_deref(), Some("HR"));
    }

    #[test]
    fn test_exact_hit_normalizes_query() {
        let cache = cache();
        cache
            .put("How much PTO do I get?", "Twenty days.", &[], None, 0.9)
            .unwrap();

        let hit = cache.get("  HOW MUCH PTO DO I GET?  ").unwrap();
        assert_eq!(hit.cache_type, CacheTier::Exact);
    }

    #[test]
    fn test_semantic_hit_on_near_duplicate() {
        let cache = cache();
        cache
            .put(
                "how many vacation days do I get each year",
                "Twenty days.",
                &[],
                Some("HR"),
                0.9,
            )
            .unwrap();

        // Same words reordered: very high lexical-embedding similarity,
        // different exact hash.
        let hit = cache.get("how many vacation days do I get each year?");
        if let Some(hit) = hit {
            assert_eq!(hit.cache_type, CacheTier::Semantic);
            assert!(hit.confidence >= 0.92);
        }
    }

    #[test]
    fn test_semantic_tier_disabled_without_embedder() {
        let cache = TwoTierCache::new(store(), None, 0.92, 24);
        cache
            .put("original question", "answer", &[], None, 0.9)
            .unwrap();
        // Different hash, no embedder: must miss
        assert!(cache.get("original question rephrased").is_none());
    }

    #[test]
    fn test_miss_on_unrelated_query() {
        let cache = cache();
        cache
            .put("How much PTO do I get?", "Twenty days.", &[], None, 0.9)
            .unwrap();
        assert!(cache.get("how do I configure the VPN client").is_none());
    }

    #[test]
    fn test_invalidate_department_blocks_hits() {
        let cache = cache();
        cache
            .put("pto question", "answer", &[], Some("HR"), 0.9)
            .unwrap();
        cache
            .put("vpn question", "answer", &[], Some("IT"), 0.9)
            .unwrap();

        cache.invalidate(Some("HR")).unwrap();
        assert!(cache.get("pto question").is_none());
        assert!(cache.get("vpn question").is_some());
    }

    #[test]
    fn test_invalidate_all() {
        let cache = cache();
        cache.put("q1", "a1", &[], Some("HR"), 0.9).unwrap();
        cache.put("q2", "a2", &[], Some("IT"), 0.9).unwrap();

        cache.invalidate(None).unwrap();
        assert!(cache.get("q1").is_none());
        assert!(cache.get("q2").is_none());
    }

    #[test]
    fn test_cleanup_removes_invalidated() {
        let store = store();
        let cache = TwoTierCache::new(Arc::clone(&store), Some(create_embedder(64)), 0.92, 24);
        cache.put("q1", "a1", &[], Some("HR"), 0.9).unwrap();
        cache.invalidate(Some("HR")).unwrap();

        let removed = cache.cleanup_expired().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.cache_len().unwrap(), 0);
    }

    #[test]
    fn test_put_overwrites_same_query() {
        let cache = cache();
        cache.put("q", "first", &[], None, 0.5).unwrap();
        cache.put("q", "second", &[], None, 0.9).unwrap();

        let hit = cache.get("q").unwrap();
        assert_eq!(hit.response, "second");
    }

    #[test]
    fn test_query_hash_stable() {
        assert_eq!(
            TwoTierCache::query_hash("Hello World"),
            TwoTierCache::query_hash("  hello world  ")
        );
        assert_ne!(
            TwoTierCache::query_hash("hello"),
            TwoTierCache::query_hash("world")
        );
    }
}
