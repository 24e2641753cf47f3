//! Hybrid retrieval: dense vector similarity fused with BM25 keyword
//! scoring.
//!
//! The two legs run concurrently, each asked for `2k` candidates; the
//! candidate union is min-max normalized per side and combined with
//! configurable weights. Responses are memoized in a bounded TTL cache.

mod bm25;
mod cache;
mod fusion;

pub use bm25::{Bm25Hit, Bm25Index, Bm25Params};
pub use cache::TtlCache;
pub use fusion::{combine, distance_to_similarity, min_max_normalize};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::config::Settings;
use crate::core::{Department, DocumentChunk};
use crate::vectorstore::VectorStore;

/// One ranked hybrid search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridResult {
    /// The retrieved chunk.
    pub chunk: DocumentChunk,
    /// Semantic similarity `1 / (1 + distance)`, 0 when only BM25
    /// matched.
    pub semantic_score: f32,
    /// Raw BM25 score, 0 when only the semantic leg matched.
    pub bm25_score: f32,
    /// Weighted combination of the normalized per-side scores.
    pub combined_score: f32,
    /// 1-based rank in the response.
    pub rank: usize,
}

/// Response from the hybrid search pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridResponse {
    /// Ranked results, best first. `combined_score` is non-increasing.
    pub results: Vec<HybridResult>,
    /// The query that produced this response.
    pub query: String,
    /// Semantic leg wall time.
    pub semantic_time_ms: f64,
    /// BM25 leg wall time.
    pub bm25_time_ms: f64,
    /// Fusion wall time.
    pub fusion_time_ms: f64,
    /// Total wall time.
    pub total_time_ms: f64,
    /// Whether this response came from the TTL cache.
    pub cache_hit: bool,
}

/// Running counters for the search engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchMetrics {
    /// Queries served.
    pub total_queries: u64,
    /// Queries served from the TTL cache.
    pub cache_hits: u64,
}

/// Hybrid search engine combining semantic and BM25 retrieval.
pub struct HybridSearchEngine {
    vectorstore: Arc<VectorStore>,
    bm25: Arc<Bm25Index>,
    semantic_weight: f32,
    bm25_weight: f32,
    cache: Mutex<TtlCache<String, HybridResponse>>,
    total_queries: AtomicU64,
    cache_hits: AtomicU64,
}

impl HybridSearchEngine {
    /// Creates an engine over the given stores with settings-derived
    /// weights and cache bounds.
    #[must_use]
    pub fn new(vectorstore: Arc<VectorStore>, bm25: Arc<Bm25Index>, settings: &Settings) -> Self {
        Self {
            vectorstore,
            bm25,
            semantic_weight: settings.semantic_weight,
            bm25_weight: settings.bm25_weight,
            cache: Mutex::new(TtlCache::new(
                settings.hybrid_cache_ttl,
                settings.hybrid_cache_maxsize,
            )),
            total_queries: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Creates an engine with explicit weights and cache bounds.
    #[must_use]
    pub fn with_weights(
        vectorstore: Arc<VectorStore>,
        bm25: Arc<Bm25Index>,
        semantic_weight: f32,
        bm25_weight: f32,
        cache_ttl: Duration,
        cache_maxsize: usize,
    ) -> Self {
        Self {
            vectorstore,
            bm25,
            semantic_weight,
            bm25_weight,
            cache: Mutex::new(TtlCache::new(cache_ttl, cache_maxsize)),
            total_queries: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Performs hybrid search, returning the top `k` fused results.
    ///
    /// Never errors: a failed leg degrades to the surviving leg with a
    /// logged warning, and a total failure returns an empty response.
    #[must_use]
    pub fn search(&self, query: &str, k: usize, department: Option<Department>) -> HybridResponse {
        let start = Instant::now();
        self.total_queries.fetch_add(1, Ordering::Relaxed);

        let cache_key = Self::cache_key(query, department, k);
        if let Ok(cache) = self.cache.lock()
            && let Some(mut cached) = cache.get(&cache_key)
        {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            cached.cache_hit = true;
            return cached;
        }

        // Both legs concurrently, each asked for 2k candidates
        let fetch = (k * 2).max(k);
        let (semantic_leg, bm25_leg) = rayon::join(
            || {
                let leg_start = Instant::now();
                let result = self.vectorstore.query(query, fetch, department);
                (result, leg_start.elapsed())
            },
            || {
                let leg_start = Instant::now();
                let hits = self.bm25.search(query, fetch, department);
                (hits, leg_start.elapsed())
            },
        );

        let (semantic_result, semantic_elapsed) = semantic_leg;
        let (bm25_hits, bm25_elapsed) = bm25_leg;

        let semantic_hits = match semantic_result {
            Ok(hits) => Some(hits),
            Err(err) => {
                warn!(error = %err, "semantic search failed, falling back to BM25 only");
                None
            }
        };

        let fusion_start = Instant::now();
        let results = match semantic_hits {
            Some(semantic) => self.fuse(semantic, bm25_hits, k),
            None => Self::single_side(
                bm25_hits
                    .into_iter()
                    .map(|hit| (hit.chunk, 0.0, hit.score))
                    .collect(),
                k,
            ),
        };
        let fusion_elapsed = fusion_start.elapsed();

        let response = HybridResponse {
            results,
            query: query.to_string(),
            semantic_time_ms: as_ms(semantic_elapsed),
            bm25_time_ms: as_ms(bm25_elapsed),
            fusion_time_ms: as_ms(fusion_elapsed),
            total_time_ms: as_ms(start.elapsed()),
            cache_hit: false,
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(cache_key, response.clone());
        }
        response
    }

    /// Clears the TTL cache.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Returns running query/cache-hit counters.
    #[must_use]
    pub fn metrics(&self) -> SearchMetrics {
        SearchMetrics {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    fn cache_key(query: &str, department: Option<Department>, k: usize) -> String {
        let dept = department.map_or("all", Department::as_str);
        let key = format!("{}|{dept}|{k}", query.trim().to_lowercase());
        hex_digest(key.as_bytes())
    }

    /// Fuses the two candidate lists: union keyed by a text digest,
    /// per-side min-max normalization across the union, weighted
    /// combination, stable tie-broken ordering.
    fn fuse(
        &self,
        semantic: Vec<crate::vectorstore::ScoredChunk>,
        bm25_hits: Vec<Bm25Hit>,
        k: usize,
    ) -> Vec<HybridResult> {
        struct Candidate {
            chunk: DocumentChunk,
            semantic: f32,
            bm25: f32,
        }

        let mut order: Vec<Candidate> = Vec::new();
        let mut by_digest: HashMap<String, usize> = HashMap::new();

        for scored in semantic {
            let digest = text_digest(&scored.chunk.text);
            let similarity = distance_to_similarity(scored.distance);
            if let Some(&idx) = by_digest.get(&digest) {
                order[idx].semantic = order[idx].semantic.max(similarity);
            } else {
                by_digest.insert(digest, order.len());
                order.push(Candidate {
                    chunk: scored.chunk,
                    semantic: similarity,
                    bm25: 0.0,
                });
            }
        }

        for hit in bm25_hits {
            let digest = text_digest(&hit.chunk.text);
            if let Some(&idx) = by_digest.get(&digest) {
                order[idx].bm25 = order[idx].bm25.max(hit.score);
            } else {
                by_digest.insert(digest, order.len());
                order.push(Candidate {
                    chunk: hit.chunk,
                    semantic: 0.0,
                    bm25: hit.score,
                });
            }
        }

        if order.is_empty() {
            return Vec::new();
        }

        let semantic_scores: Vec<f32> = order.iter().map(|c| c.semantic).collect();
        let bm25_scores: Vec<f32> = order.iter().map(|c| c.bm25).collect();
        let norm_semantic = min_max_normalize(&semantic_scores);
        let norm_bm25 = min_max_normalize(&bm25_scores);

        let mut results: Vec<HybridResult> = order
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| HybridResult {
                chunk: candidate.chunk,
                semantic_score: candidate.semantic,
                bm25_score: candidate.bm25,
                combined_score: combine(
                    norm_semantic[i],
                    norm_bm25[i],
                    self.semantic_weight,
                    self.bm25_weight,
                ),
                rank: 0,
            })
            .collect();

        sort_and_rank(&mut results, k);
        results
    }

    /// Builds a single-side result list (degraded mode): the surviving
    /// side's scores are min-max normalized into the combined score.
    fn single_side(side: Vec<(DocumentChunk, f32, f32)>, k: usize) -> Vec<HybridResult> {
        if side.is_empty() {
            return Vec::new();
        }
        let raw: Vec<f32> = side
            .iter()
            .map(|(_, sem, bm)| if *sem > 0.0 { *sem } else { *bm })
            .collect();
        let normalized = min_max_normalize(&raw);
        let mut results: Vec<HybridResult> = side
            .into_iter()
            .enumerate()
            .map(|(i, (chunk, semantic_score, bm25_score))| HybridResult {
                chunk,
                semantic_score,
                bm25_score,
                combined_score: normalized[i],
                rank: 0,
            })
            .collect();
        sort_and_rank(&mut results, k);
        results
    }
}

/// Sorts by descending combined score, breaking ties by semantic score
/// then lexicographic chunk id, truncates to `k`, and assigns ranks.
fn sort_and_rank(results: &mut Vec<HybridResult>, k: usize) {
    results.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.semantic_score
                    .partial_cmp(&a.semantic_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
    });
    results.truncate(k);
    for (i, result) in results.iter_mut().enumerate() {
        result.rank = i + 1;
    }
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Hex SHA-256 digest of raw bytes.
fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Short stable digest identifying a chunk by its text, used as the
/// fusion union key.
fn text_digest(text: &str) -> String {
    let mut digest = hex_digest(text.as_bytes());
    digest.truncate(16);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::create_embedder;
    use crate::storage::SqliteStore;

    fn sample_chunks() -> Vec<DocumentChunk> {
        vec![
            DocumentChunk::new(
                "hr_policies.md",
                "PTO Policy",
                "Employees receive twenty days of paid vacation time each year. Vacation \
                 requests are submitted through the HR portal.",
                0,
            ),
            DocumentChunk::new(
                "hr_policies.md",
                "Benefits",
                "Health, dental, and vision insurance start on day one. The 401k match \
                 begins after ninety days.",
                1,
            ),
            DocumentChunk::new(
                "it_policies.md",
                "VPN Setup",
                "Install the VPN client from the software portal. The VPN requires MFA \
                 enrollment before the first connection.",
                0,
            ),
        ]
    }

    fn engine() -> HybridSearchEngine {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.init().unwrap();
        let vectorstore = Arc::new(VectorStore::new(store, create_embedder(64)));
        let bm25 = Arc::new(Bm25Index::default());

        let chunks = sample_chunks();
        vectorstore.add_documents(&chunks).unwrap();
        bm25.rebuild(&chunks);

        HybridSearchEngine::with_weights(
            vectorstore,
            bm25,
            0.7,
            0.3,
            Duration::from_secs(300),
            100,
        )
    }

    #[test]
    fn test_search_returns_ranked_results() {
        let engine = engine();
        let response = engine.search("vacation days", 3, None);

        assert!(!response.results.is_empty());
        assert!(!response.cache_hit);
        for (i, result) in response.results.iter().enumerate() {
            assert_eq!(result.rank, i + 1);
        }
        for pair in response.results.windows(2) {
            assert!(pair[0].combined_score >= pair[1].combined_score);
        }
        assert_eq!(response.results[0].chunk.section_title, "PTO Policy");
    }

    #[test]
    fn test_search_cache_hit() {
        let engine = engine();
        let first = engine.search("vpn setup", 3, None);
        let second = engine.search("vpn setup", 3, None);

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.results.len(), second.results.len());
        assert_eq!(engine.metrics().cache_hits, 1);
        assert_eq!(engine.metrics().total_queries, 2);
    }

    #[test]
    fn test_cache_key_includes_department_and_k() {
        let engine = engine();
        engine.search("vpn", 3, None);
        let filtered = engine.search("vpn", 3, Some(Department::It));
        assert!(!filtered.cache_hit);
        let different_k = engine.search("vpn", 5, None);
        assert!(!different_k.cache_hit);
    }

    #[test]
    fn test_cache_key_normalizes_query_case() {
        let engine = engine();
        engine.search("VPN Setup", 3, None);
        let second = engine.search("  vpn setup ", 3, None);
        assert!(second.cache_hit);
    }

    #[test]
    fn test_department_filter_restricts_results() {
        let engine = engine();
        let response = engine.search("policy setup", 5, Some(Department::It));
        assert!(
            response
                .results
                .iter()
                .all(|r| r.chunk.department == Department::It)
        );
    }

    #[test]
    fn test_empty_collection_returns_empty_response() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store.init().unwrap();
        let vectorstore = Arc::new(VectorStore::new(store, create_embedder(16)));
        let engine = HybridSearchEngine::with_weights(
            vectorstore,
            Arc::new(Bm25Index::default()),
            0.7,
            0.3,
            Duration::from_secs(300),
            100,
        );

        let response = engine.search("anything at all", 5, None);
        assert!(response.results.is_empty());
    }

    #[test]
    fn test_keyword_only_match_survives_fusion() {
        // "MFA" appears verbatim only in the IT chunk; BM25 should carry
        // it into the fused results even if semantics rank it low.
        let engine = engine();
        let response = engine.search("MFA enrollment", 3, None);
        assert!(
            response
                .results
                .iter()
                .any(|r| r.chunk.filename == "it_policies.md")
        );
    }

    #[test]
    fn test_combined_scores_monotone_nonincreasing() {
        let engine = engine();
        for query in ["vacation", "vpn", "insurance dental", "benefits match"] {
            let response = engine.search(query, 5, None);
            for pair in response.results.windows(2) {
                assert!(
                    pair[0].combined_score >= pair[1].combined_score,
                    "ranking must be monotone for query {query}"
                );
            }
        }
    }

    #[test]
    fn test_text_digest_stable() {
        assert_eq!(text_digest("hello"), text_digest("hello"));
        assert_ne!(text_digest("hello"), text_digest("world"));
        assert_eq!(text_digest("hello").len(), 16);
    }
}
