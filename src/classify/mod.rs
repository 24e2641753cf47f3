//! Department classification.
//!
//! The trained TF-IDF + logistic-regression pipeline sits behind the
//! [`DepartmentClassifier`] contract; when its artifact is absent the
//! router degrades to keyword-only mode through a fallback
//! implementation that predicts General with zero confidence.

mod artifact;

pub use artifact::{ArtifactClassifier, ClassifierArtifact};

use std::path::Path;

use tracing::warn;

use crate::core::Department;

/// A department prediction with class probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Argmax class.
    pub department: Department,
    /// Probability of the argmax class, in `[0, 1]`.
    pub confidence: f32,
    /// Probability per class, in label order.
    pub probabilities: Vec<(Department, f32)>,
}

/// Contract for department predictors.
///
/// Implementations must be deterministic: identical input text yields an
/// identical prediction.
pub trait DepartmentClassifier: Send + Sync {
    /// Predicts the responsible department for a query.
    fn predict(&self, text: &str) -> Prediction;

    /// Whether a trained model backs this classifier. The fallback
    /// returns `false` so callers can log the degraded mode.
    fn is_model_backed(&self) -> bool;
}

/// Fallback used when no model artifact is available: predicts General
/// with zero confidence, leaving routing entirely to the keyword rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordFallbackClassifier;

impl DepartmentClassifier for KeywordFallbackClassifier {
    fn predict(&self, _text: &str) -> Prediction {
        Prediction {
            department: Department::General,
            confidence: 0.0,
            probabilities: Department::ALL.iter().map(|&d| (d, 0.0)).collect(),
        }
    }

    fn is_model_backed(&self) -> bool {
        false
    }
}

/// Loads the artifact classifier, degrading to the keyword fallback when
/// the artifact is missing or malformed.
#[must_use]
pub fn create_classifier(model_path: &Path) -> Box<dyn DepartmentClassifier> {
    match ArtifactClassifier::load(model_path) {
        Ok(classifier) => Box::new(classifier),
        Err(err) => {
            warn!(error = %err, "classifier unavailable, routing degrades to keyword-only mode");
            Box::new(KeywordFallbackClassifier)
        }
    }
}
