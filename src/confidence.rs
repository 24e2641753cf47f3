//! Confidence scoring and human-escalation decisions.
//!
//! Confidence is computed from retrieval signals; escalation fires on
//! low confidence, empty retrieval, sensitive topics, PII in the query,
//! or near-duplicate repeat questions, and carries the responsible
//! department's contact information.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::RouteTarget;

/// Confidence level of a generated answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    /// Strong retrieval support.
    High,
    /// Moderate retrieval support.
    Medium,
    /// Weak retrieval support.
    Low,
    /// No documents retrieved.
    None,
}

impl ConfidenceLevel {
    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::None => "none",
        }
    }
}

/// Scores answer confidence from the retrieval's combined scores.
///
/// `score = 0.5·top + 0.3·avg + 0.2·min(1, n/2)`; level thresholds are
/// configurable (defaults 0.70 / 0.40). Zero documents yield
/// [`ConfidenceLevel::None`] with score 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_confidence(
    combined_scores: &[f32],
    high_threshold: f32,
    medium_threshold: f32,
) -> (ConfidenceLevel, f32) {
    if combined_scores.is_empty() {
        return (ConfidenceLevel::None, 0.0);
    }

    let top = combined_scores
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    let avg = combined_scores.iter().sum::<f32>() / combined_scores.len() as f32;
    let doc_factor = (combined_scores.len() as f32 / 2.0).min(1.0);
    let score = 0.2f32.mul_add(doc_factor, 0.5f32.mul_add(top, 0.3 * avg));

    let level = if score >= high_threshold {
        ConfidenceLevel::High
    } else if score >= medium_threshold {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    };
    (level, score)
}

/// Contact information for a department's human support channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Team name.
    pub name: String,
    /// Support email.
    pub email: String,
    /// Phone extension.
    pub phone: String,
    /// Staffed hours.
    pub hours: String,
}

fn contact(name: &str, email: &str, phone: &str, hours: &str) -> ContactInfo {
    ContactInfo {
        name: name.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        hours: hours.to_string(),
    }
}

/// Returns the contact for a routing target. Progress and General both
/// resolve to general support.
#[must_use]
pub fn department_contact(target: RouteTarget) -> ContactInfo {
    use crate::core::Department;
    match target {
        RouteTarget::Department(Department::Hr) => {
            contact("HR Support Team", "hr@company.com", "ext. 2000", "Monday-Friday, 9 AM - 5 PM")
        }
        RouteTarget::Department(Department::It) => contact(
            "IT Help Desk",
            "it-helpdesk@company.com",
            "ext. 3000",
            "24/7 for emergencies",
        ),
        RouteTarget::Department(Department::Security) => {
            contact("Security Team", "security@company.com", "ext. 4000", "24/7")
        }
        RouteTarget::Department(Department::Finance) => contact(
            "Finance Department",
            "finance@company.com",
            "ext. 5000",
            "Monday-Friday, 9 AM - 5 PM",
        ),
        RouteTarget::Department(Department::General) | RouteTarget::Progress => contact(
            "General Support",
            "support@company.com",
            "ext. 1000",
            "Monday-Friday, 8 AM - 6 PM",
        ),
    }
}

/// Why a query is escalated to a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// Answer confidence below the threshold.
    LowConfidence,
    /// Retrieval returned nothing.
    NoDocumentsFound,
    /// The query touches a sensitive topic.
    SensitiveTopic,
    /// The query contains personally identifiable information.
    PiiDetected,
    /// The user keeps asking near-duplicate questions.
    RepeatedQuery,
}

/// Escalation urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationPriority {
    /// Routine follow-up.
    Low,
    /// Should be looked at soon.
    Medium,
    /// Needs prompt human attention.
    High,
}

/// A human-escalation directive attached to a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationDirective {
    /// Primary reason; additional reasons are folded into the message.
    pub reason: EscalationReason,
    /// Urgency.
    pub priority: EscalationPriority,
    /// Human-readable notice shown to the user.
    pub message: String,
    /// Who to contact.
    pub contact: ContactInfo,
}

#[allow(clippy::unwrap_used)]
static SENSITIVE_TOPIC_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(harass|discriminat|bully|hostile|threat|legal|lawsuit|terminat|fire|resign)",
        r"(?i)\b(mental health|depress|anxiet|stress|burnout|suicide)",
        r"(?i)\b(complaint|grievance|whistle|report\s+misconduct)",
        r"(?i)\b(confidential|proprietary|trade\s+secret|classified)\b",
    ]
    .iter()
    .map(|pattern| {
        Regex::new(pattern).unwrap()
    })
    .collect()
});

#[allow(clippy::unwrap_used)]
static PII_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Email address
        r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
        // US social security number
        r"\b\d{3}-\d{2}-\d{4}\b",
        // Payment card number (13-16 digits, optionally separated)
        r"\b(?:\d[ -]?){13,16}\b",
        // Phone number
        r"\b(?:\+?1[ -]?)?\(?\d{3}\)?[ -]?\d{3}[ -]?\d{4}\b",
    ]
    .iter()
    .map(|pattern| {
        Regex::new(pattern).unwrap()
    })
    .collect()
});

/// Jaccard similarity threshold for the repeated-query check.
const REPEAT_SIMILARITY: f32 = 0.8;
/// How many near-duplicate recent queries trigger escalation.
const REPEAT_COUNT: usize = 2;

/// Decides when a query warrants a human-escalation directive.
#[derive(Debug, Clone)]
pub struct EscalationEngine {
    confidence_threshold: f32,
}

impl EscalationEngine {
    /// Creates an engine escalating below the given confidence score.
    #[must_use]
    pub const fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
        }
    }

    /// Evaluates a served query. Returns a directive when any trigger
    /// fires; the highest-priority reason wins.
    ///
    /// `recent_queries` are the user's prior questions from conversation
    /// memory, used for the near-duplicate check.
    #[must_use]
    pub fn evaluate(
        &self,
        query: &str,
        confidence_score: f32,
        documents_found: usize,
        target: RouteTarget,
        recent_queries: &[String],
    ) -> Option<EscalationDirective> {
        let mut reasons: Vec<(EscalationReason, EscalationPriority)> = Vec::new();

        if is_sensitive_topic(query) {
            reasons.push((EscalationReason::SensitiveTopic, EscalationPriority::High));
        }
        if documents_found == 0 {
            reasons.push((
                EscalationReason::NoDocumentsFound,
                EscalationPriority::Medium,
            ));
        }
        if contains_pii(query) {
            reasons.push((EscalationReason::PiiDetected, EscalationPriority::Medium));
        }
        if near_duplicate_count(query, recent_queries) >= REPEAT_COUNT {
            reasons.push((EscalationReason::RepeatedQuery, EscalationPriority::Medium));
        }
        if confidence_score < self.confidence_threshold {
            reasons.push((EscalationReason::LowConfidence, EscalationPriority::Low));
        }

        let (reason, priority) = reasons.into_iter().max_by_key(|(_, p)| *p)?;
        let contact = department_contact(target);
        let message = escalation_message(reason, &contact);

        Some(EscalationDirective {
            reason,
            priority,
            message,
            contact,
        })
    }
}

fn escalation_message(reason: EscalationReason, contact: &ContactInfo) -> String {
    let lead = match reason {
        EscalationReason::SensitiveTopic => {
            "This is an important topic that deserves direct human support."
        }
        EscalationReason::NoDocumentsFound => {
            "I couldn't find policy documentation covering this question."
        }
        EscalationReason::PiiDetected => {
            "Your message appears to contain personal information, so a human should handle it."
        }
        EscalationReason::RepeatedQuery => {
            "You've asked about this a few times, so let's get you direct help."
        }
        EscalationReason::LowConfidence => {
            "I'm not fully confident in this answer."
        }
    };
    format!(
        "{lead} Please contact the {} at {} ({}, {}).",
        contact.name, contact.email, contact.phone, contact.hours
    )
}

/// Checks the sensitive-topic pattern set.
#[must_use]
pub fn is_sensitive_topic(query: &str) -> bool {
    SENSITIVE_TOPIC_RES.iter().any(|re| re.is_match(query))
}

/// Checks for PII-shaped content.
#[must_use]
pub fn contains_pii(query: &str) -> bool {
    PII_RES.iter().any(|re| re.is_match(query))
}

/// Jaccard word-set similarity between two queries.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let set_a: std::collections::HashSet<String> =
        a.to_lowercase().split_whitespace().map(String::from).collect();
    let set_b: std::collections::HashSet<String> =
        b.to_lowercase().split_whitespace().map(String::from).collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count() as f32;
    let union = set_a.union(&set_b).count() as f32;
    intersection / union
}

fn near_duplicate_count(query: &str, recent: &[String]) -> usize {
    recent
        .iter()
        .filter(|prior| jaccard_similarity(query, prior) > REPEAT_SIMILARITY)
        .count()
}
