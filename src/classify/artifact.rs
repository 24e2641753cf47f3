//! TF-IDF + multinomial logistic regression classifier loaded from a
//! serialized artifact.
//!
//! The artifact is produced offline by the training job: a JSON pipeline
//! export carrying the fitted vocabulary, idf weights, coefficient
//! matrix, intercepts, and class labels. Inference reproduces the
//! training pipeline: lowercase 1–2 gram tokenization with stopword
//! removal, tf·idf weighting, L2 normalization, affine scores, softmax.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::classify::{DepartmentClassifier, Prediction};
use crate::core::Department;
use crate::error::ClassifierError;

/// English stopwords removed before n-gram construction.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "below", "between", "both", "but", "by", "can",
    "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from", "further",
    "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if",
    "in", "into", "is", "it", "its", "just", "me", "more", "most", "my", "no", "nor", "not",
    "now", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over", "own", "same",
    "she", "should", "so", "some", "such", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "you", "your",
];

// Matches the training vectorizer's token pattern: word characters,
// minimum length two.
#[allow(clippy::unwrap_used)]
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?u)\b\w\w+\b").unwrap()
});

/// Serialized classifier pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    /// Fitted term → feature index mapping.
    pub vocabulary: HashMap<String, usize>,
    /// Inverse document frequency per feature index.
    pub idf: Vec<f32>,
    /// N-gram range, inclusive (e.g. `[1, 2]`).
    pub ngram_range: (usize, usize),
    /// Logistic-regression coefficients, one row per class.
    pub coefficients: Vec<Vec<f32>>,
    /// Per-class intercepts.
    pub intercepts: Vec<f32>,
    /// Class labels, in coefficient row order.
    pub classes: Vec<String>,
}

impl ClassifierArtifact {
    fn validate(&self) -> Result<(), ClassifierError> {
        let n_features = self.idf.len();
        if let Some(&max_idx) = self.vocabulary.values().max()
            && max_idx >= n_features
        {
            return Err(ClassifierError::InconsistentArtifact {
                reason: format!("vocabulary index {max_idx} exceeds {n_features} idf weights"),
            });
        }
        if self.coefficients.len() != self.classes.len() {
            return Err(ClassifierError::InconsistentArtifact {
                reason: format!(
                    "{} coefficient rows for {} classes",
                    self.coefficients.len(),
                    self.classes.len()
                ),
            });
        }
        if self.intercepts.len() != self.classes.len() {
            return Err(ClassifierError::InconsistentArtifact {
                reason: format!(
                    "{} intercepts for {} classes",
                    self.intercepts.len(),
                    self.classes.len()
                ),
            });
        }
        for (i, row) in self.coefficients.iter().enumerate() {
            if row.len() != n_features {
                return Err(ClassifierError::InconsistentArtifact {
                    reason: format!(
                        "coefficient row {i} has {} entries, expected {n_features}",
                        row.len()
                    ),
                });
            }
        }
        if self.ngram_range.0 == 0 || self.ngram_range.0 > self.ngram_range.1 {
            return Err(ClassifierError::InconsistentArtifact {
                reason: format!("invalid ngram range {:?}", self.ngram_range),
            });
        }
        Ok(())
    }
}

/// Department classifier backed by a trained artifact.
#[derive(Debug)]
pub struct ArtifactClassifier {
    artifact: ClassifierArtifact,
    labels: Vec<Department>,
}

impl ArtifactClassifier {
    /// Loads and validates the artifact at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError::ModelMissing`] when the file does not
    /// exist and [`ClassifierError::MalformedArtifact`] /
    /// [`ClassifierError::InconsistentArtifact`] for parse or shape
    /// problems.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        if !path.exists() {
            return Err(ClassifierError::ModelMissing {
                path: path.display().to_string(),
            });
        }
        let raw = std::fs::read_to_string(path).map_err(|err| {
            ClassifierError::MalformedArtifact {
                reason: err.to_string(),
            }
        })?;
        let artifact: ClassifierArtifact = serde_json::from_str(&raw)?;
        Self::from_artifact(artifact)
    }

    /// Builds a classifier from an in-memory artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact shape is inconsistent or a class
    /// label is unknown.
    pub fn from_artifact(artifact: ClassifierArtifact) -> Result<Self, ClassifierError> {
        artifact.validate()?;
        let labels = artifact
            .classes
            .iter()
            .map(|label| {
                Department::parse(label).ok_or_else(|| ClassifierError::InconsistentArtifact {
                    reason: format!("unknown class label: {label}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { artifact, labels })
    }

    /// Tokenizes text the way the training vectorizer did.
    fn tokenize(text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        TOKEN_RE
            .find_iter(&lower)
            .map(|m| m.as_str().to_string())
            .filter(|token| !STOPWORDS.contains(&token.as_str()))
            .collect()
    }

    /// Builds the sparse tf·idf feature vector, L2-normalized.
    fn featurize(&self, text: &str) -> HashMap<usize, f32> {
        let tokens = Self::tokenize(text);
        let (lo, hi) = self.artifact.ngram_range;

        let mut counts: HashMap<usize, f32> = HashMap::new();
        for n in lo..=hi {
            if tokens.len() < n {
                break;
            }
            for window in tokens.windows(n) {
                let gram = window.join(" ");
                if let Some(&idx) = self.artifact.vocabulary.get(&gram) {
                    *counts.entry(idx).or_insert(0.0) += 1.0;
                }
            }
        }

        for (idx, value) in &mut counts {
            *value *= self.artifact.idf[*idx];
        }

        let norm: f32 = counts.values().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in counts.values_mut() {
                *value /= norm;
            }
        }
        counts
    }
}

impl DepartmentClassifier for ArtifactClassifier {
    fn predict(&self, text: &str) -> Prediction {
        let features = self.featurize(text);

        let scores: Vec<f32> = self
            .artifact
            .coefficients
            .iter()
            .zip(&self.artifact.intercepts)
            .map(|(row, intercept)| {
                features
                    .iter()
                    .map(|(&idx, &value)| row[idx] * value)
                    .sum::<f32>()
                    + intercept
            })
            .collect();

        let probabilities = softmax(&scores);
        let (best_idx, best_prob) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .unwrap_or((0, 0.0));

        Prediction {
            department: self.labels.get(best_idx).copied().unwrap_or(Department::General),
            confidence: best_prob,
            probabilities: self
                .labels
                .iter()
                .copied()
                .zip(probabilities)
                .collect(),
        }
    }

    fn is_model_backed(&self) -> bool {
        true
    }
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
