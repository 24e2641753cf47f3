//! Query routing: classifier prediction combined with keyword overrides
//! and multi-intent detection.
//!
//! The router never calls the LLM and is deterministic for a given query.

mod keywords;

pub use keywords::{
    KeywordMatch, PROGRESS_INTENT_PHRASES, is_greeting, match_departments,
    matches_progress_intent, translate_arabic_query,
};

use tracing::debug;

use crate::classify::DepartmentClassifier;
use crate::core::{Department, RouteTarget, RoutingDecision};

/// Secondary-intent probability threshold for multi-intent detection.
const SECONDARY_INTENT_THRESHOLD: f32 = 0.3;

/// Rule+model hybrid department router.
pub struct Router {
    classifier: Box<dyn DepartmentClassifier>,
    confidence_threshold: f32,
}

impl Router {
    /// Creates a router over a classifier with the given low-confidence
    /// override threshold.
    #[must_use]
    pub fn new(classifier: Box<dyn DepartmentClassifier>, confidence_threshold: f32) -> Self {
        Self {
            classifier,
            confidence_threshold,
        }
    }

    /// Routes a query, applying the override rules in order:
    ///
    /// 1. Classifier prediction.
    /// 2. Bilingual keyword matching.
    /// 3. Confirmation: keywords agreeing with the prediction keep it.
    /// 4. Low confidence: below-threshold predictions yield to the
    ///    keyword department with the most matches.
    /// 5. Progress/task intent phrases force the Progress handler.
    /// 6. Greetings and general-help queries force the Progress handler.
    #[must_use]
    pub fn route(&self, text: &str) -> RoutingDecision {
        let prediction = self.classifier.predict(text);
        let matches = match_departments(text);

        let mut decision = RoutingDecision {
            predicted_department: prediction.department,
            prediction_confidence: prediction.confidence,
            final_department: RouteTarget::Department(prediction.department),
            departments: self.detect_departments(text),
            was_overridden: false,
            override_reason: None,
            is_multi_intent: false,
        };
        decision.is_multi_intent = decision.departments.len() > 1;

        // Confirmation first: a keyword match on the predicted
        // department pins the prediction.
        let keyword_dept = if matches
            .iter()
            .any(|m| m.department == prediction.department)
        {
            Some(prediction.department)
        } else {
            // First department in table order wins ties on match count
            let mut best: Option<&KeywordMatch> = None;
            for candidate in &matches {
                if best.is_none_or(|b| candidate.keywords.len() > b.keywords.len()) {
                    best = Some(candidate);
                }
            }
            best.map(|m| m.department)
        };

        if let Some(dept) = keyword_dept {
            if dept == prediction.department {
                debug!(department = %dept, "keywords confirm classifier prediction");
            } else if prediction.confidence < self.confidence_threshold {
                decision.final_department = RouteTarget::Department(dept);
                decision.was_overridden = true;
                decision.override_reason = Some(format!(
                    "Low classifier confidence ({:.2}), keyword match for {dept}",
                    prediction.confidence
                ));
            }
        }

        if matches_progress_intent(text) {
            if decision.final_department != RouteTarget::Progress {
                decision.was_overridden = true;
                decision.override_reason =
                    Some("Strong progress/task keywords detected".to_string());
            }
            decision.final_department = RouteTarget::Progress;
        }

        if is_greeting(text) {
            if decision.final_department != RouteTarget::Progress {
                decision.was_overridden = true;
                decision.override_reason = Some("Greeting or general query detected".to_string());
            }
            decision.final_department = RouteTarget::Progress;
        }

        debug!(
            predicted = %decision.predicted_department,
            confidence = decision.prediction_confidence,
            target = %decision.final_department,
            overridden = decision.was_overridden,
            "routing decision"
        );
        decision
    }

    /// Detects every department the query spans: the union of keyword
    /// matches (in table order) and classifier secondary intents above
    /// the threshold.
    #[must_use]
    pub fn detect_departments(&self, text: &str) -> Vec<Department> {
        let mut departments: Vec<Department> = match_departments(text)
            .into_iter()
            .map(|m| m.department)
            .collect();

        let prediction = self.classifier.predict(text);
        for (department, probability) in &prediction.probabilities {
            if *probability >= SECONDARY_INTENT_THRESHOLD
                && *department != Department::General
                && !departments.contains(department)
            {
                departments.push(*department);
            }
        }

        departments
    }
}
