//! Normalized-score fusion for hybrid retrieval.
//!
//! Semantic and BM25 scores live on incomparable scales; each side is
//! min-max normalized across the candidate union before the weighted
//! combination.

/// Min-max normalizes scores to the `[0, 1]` range.
///
/// An empty slice stays empty. When all scores are equal the whole side
/// collapses to 1.0, which is rank-neutral after weighting.
#[must_use]
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let min = scores.iter().copied().fold(f32::INFINITY, f32::min);
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if (max - min).abs() < f32::EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / (max - min)).collect()
}

/// Converts a cosine distance to the similarity used for fusion:
/// `s = 1 / (1 + d)`.
#[must_use]
pub fn distance_to_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance)
}

/// Weighted combination of normalized per-side scores.
#[must_use]
pub fn combine(norm_semantic: f32, norm_bm25: f32, semantic_weight: f32, bm25_weight: f32) -> f32 {
    semantic_weight.mul_add(norm_semantic, bm25_weight * norm_bm25)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_empty() {
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn test_normalize_range() {
        let normalized = min_max_normalize(&[2.0, 4.0, 6.0]);
        assert!((normalized[0]).abs() < 1e-6);
        assert!((normalized[1] - 0.5).abs() < 1e-6);
        assert!((normalized[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_all_equal() {
        let normalized = min_max_normalize(&[3.0, 3.0, 3.0]);
        assert_eq!(normalized, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_normalize_preserves_order() {
        let scores = [0.1, 5.0, 2.5, 0.9];
        let normalized = min_max_normalize(&scores);
        let mut indices: Vec<usize> = (0..scores.len()).collect();
        indices.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap());
        let mut norm_indices: Vec<usize> = (0..normalized.len()).collect();
        norm_indices.sort_by(|&a, &b| normalized[b].partial_cmp(&normalized[a]).unwrap());
        assert_eq!(indices, norm_indices);
    }

    #[test]
    fn test_distance_to_similarity() {
        assert!((distance_to_similarity(0.0) - 1.0).abs() < 1e-6);
        assert!((distance_to_similarity(1.0) - 0.5).abs() < 1e-6);
        assert!(distance_to_similarity(9.0) < distance_to_similarity(1.0));
    }

    #[test]
    fn test_combine_weights() {
        let combined = combine(1.0, 0.0, 0.7, 0.3);
        assert!((combined - 0.7).abs() < 1e-6);
        let combined = combine(0.0, 1.0, 0.7, 0.3);
        assert!((combined - 0.3).abs() < 1e-6);
        let combined = combine(1.0, 1.0, 0.7, 0.3);
        assert!((combined - 1.0).abs() < 1e-6);
    }
}
