//! In-memory Okapi BM25 index over the chunk collection.
//!
//! Tokenization is Unicode word boundaries, lowercased, no stemming.
//! Rebuilds are O(N) in the corpus, which stays small (≤10⁴ chunks);
//! readers work against a versioned snapshot swapped atomically under a
//! writer lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use unicode_segmentation::UnicodeSegmentation;

use crate::core::{Department, DocumentChunk};

/// Okapi BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Document-length normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// A BM25 hit: the matched chunk and its raw score.
#[derive(Debug, Clone)]
pub struct Bm25Hit {
    /// The matched chunk.
    pub chunk: DocumentChunk,
    /// Raw Okapi BM25 score (> 0).
    pub score: f32,
}

#[derive(Debug)]
struct IndexedDoc {
    chunk: DocumentChunk,
    term_counts: HashMap<String, u32>,
    length: f32,
}

#[derive(Debug, Default)]
struct Snapshot {
    docs: Vec<IndexedDoc>,
    doc_freq: HashMap<String, u32>,
    avg_doc_len: f32,
}

/// Keyword index with tunable `k1`/`b` and a department filter.
#[derive(Debug)]
pub struct Bm25Index {
    params: Bm25Params,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new(Bm25Params::default())
    }
}

impl Bm25Index {
    /// Creates an empty index with the given parameters.
    #[must_use]
    pub fn new(params: Bm25Params) -> Self {
        Self {
            params,
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Tokenizes text: Unicode word boundaries, lowercased.
    #[must_use]
    pub fn tokenize(text: &str) -> Vec<String> {
        text.unicode_words().map(str::to_lowercase).collect()
    }

    fn load(&self) -> Arc<Snapshot> {
        match self.snapshot.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn store(&self, snapshot: Snapshot) {
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(snapshot);
    }

    /// Replaces the index contents with the given chunks.
    pub fn rebuild(&self, chunks: &[DocumentChunk]) {
        let mut docs = Vec::with_capacity(chunks.len());
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        let mut total_len = 0f32;

        for chunk in chunks {
            let tokens = Self::tokenize(&chunk.text);
            #[allow(clippy::cast_precision_loss)]
            let length = tokens.len() as f32;
            total_len += length;

            let mut term_counts: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_counts.entry(token).or_insert(0) += 1;
            }
            for term in term_counts.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            docs.push(IndexedDoc {
                chunk: chunk.clone(),
                term_counts,
                length,
            });
        }

        #[allow(clippy::cast_precision_loss)]
        let avg_doc_len = if docs.is_empty() {
            0.0
        } else {
            total_len / docs.len() as f32
        };

        self.store(Snapshot {
            docs,
            doc_freq,
            avg_doc_len,
        });
    }

    /// Adds chunks to the index, rebuilding the postings.
    pub fn add(&self, chunks: &[DocumentChunk]) {
        if chunks.is_empty() {
            return;
        }
        let current = self.load();
        let mut all: Vec<DocumentChunk> = current.docs.iter().map(|d| d.chunk.clone()).collect();
        // Same chunk_id overwrites the previous entry
        all.retain(|existing| !chunks.iter().any(|c| c.chunk_id == existing.chunk_id));
        all.extend_from_slice(chunks);
        self.rebuild(&all);
    }

    /// Clears the index.
    pub fn clear(&self) {
        self.store(Snapshot::default());
    }

    /// Returns the number of indexed chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.load().docs.len()
    }

    /// Checks if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.load().docs.is_empty()
    }

    /// Searches the index, returning up to `k` positive-scoring hits
    /// ordered by descending score.
    ///
    /// A department filter zeroes the scores of non-matching chunks
    /// before top-k selection.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn search(&self, query: &str, k: usize, department: Option<Department>) -> Vec<Bm25Hit> {
        let snapshot = self.load();
        if snapshot.docs.is_empty() || k == 0 {
            return Vec::new();
        }

        let query_terms = Self::tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let n_docs = snapshot.docs.len() as f32;
        let mut hits: Vec<Bm25Hit> = snapshot
            .docs
            .iter()
            .filter_map(|doc| {
                if let Some(dept) = department
                    && doc.chunk.department != dept
                {
                    return None;
                }
                let mut score = 0f32;
                for term in &query_terms {
                    let Some(&tf) = doc.term_counts.get(term) else {
                        continue;
                    };
                    let df = snapshot.doc_freq.get(term).copied().unwrap_or(0) as f32;
                    let idf = ((n_docs - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let tf = tf as f32;
                    let denom = tf
                        + self.params.k1
                            * (1.0 - self.params.b
                                + self.params.b * doc.length / snapshot.avg_doc_len.max(1e-6));
                    score += idf * (tf * (self.params.k1 + 1.0)) / denom;
                }
                (score > 0.0).then(|| Bm25Hit {
                    chunk: doc.chunk.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
        });
        hits.truncate(k);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunks() -> Vec<DocumentChunk> {
        vec![
            DocumentChunk::new(
                "hr_policies.md",
                "PTO Policy",
                "Employees receive twenty days of paid vacation each year. Vacation requests \
                 go through the HR portal.",
                0,
            ),
            DocumentChunk::new(
                "it_policies.md",
                "VPN Setup",
                "Install the VPN client. The VPN requires MFA enrollment before first use.",
                0,
            ),
            DocumentChunk::new(
                "finance_policies.md",
                "Expenses",
                "Submit expense reports within thirty days. Expense reimbursement arrives \
                 with the next payroll run.",
                0,
            ),
        ]
    }

    fn index() -> Bm25Index {
        let index = Bm25Index::default();
        index.rebuild(&sample_chunks());
        index
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            Bm25Index::tokenize("Set up the VPN, please!"),
            vec!["set", "up", "the", "vpn", "please"]
        );
    }

    #[test]
    fn test_tokenize_unicode() {
        let tokens = Bm25Index::tokenize("إجازة سنوية");
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_search_finds_matching_doc() {
        let hits = index().search("vpn", 10, None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.filename, "it_policies.md");
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_search_ranks_by_frequency() {
        let hits = index().search("vacation expense", 10, None);
        assert!(hits.len() >= 2);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_search_no_match() {
        assert!(index().search("kubernetes", 10, None).is_empty());
    }

    #[test]
    fn test_search_department_filter() {
        // "days" appears in both HR and Finance chunks
        let all = index().search("days", 10, None);
        assert_eq!(all.len(), 2);

        let hr_only = index().search("days", 10, Some(Department::Hr));
        assert_eq!(hr_only.len(), 1);
        assert_eq!(hr_only[0].chunk.department, Department::Hr);
    }

    #[test]
    fn test_search_empty_index() {
        let index = Bm25Index::default();
        assert!(index.search("anything", 10, None).is_empty());
    }

    #[test]
    fn test_search_empty_query() {
        assert!(index().search("", 10, None).is_empty());
    }

    #[test]
    fn test_add_overwrites_same_chunk_id() {
        let index = index();
        assert_eq!(index.len(), 3);

        let replacement = DocumentChunk::new("it_policies.md", "VPN Setup", "replaced text", 0);
        index.add(std::slice::from_ref(&replacement));
        assert_eq!(index.len(), 3);

        let hits = index.search("replaced", 10, None);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_clear() {
        let index = index();
        index.clear();
        assert!(index.is_empty());
    }

    #[test]
    fn test_top_k_truncation() {
        let index = index();
        let hits = index.search("days", 1, None);
        assert_eq!(hits.len(), 1);
    }
}
