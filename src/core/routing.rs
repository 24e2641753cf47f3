//! Routing decision types.
//!
//! A routing decision records what the classifier predicted, what the
//! keyword rules decided, and which handler(s) will ultimately run.

use serde::{Deserialize, Serialize};

use super::chunk::Department;

/// Where a query is dispatched.
///
/// `Progress` is a pseudo-department: it selects the task-tracking
/// handler and never appears as corpus metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RouteTarget {
    /// A corpus department handler.
    Department(Department),
    /// The task-tracking handler.
    Progress,
}

impl RouteTarget {
    /// Returns the canonical wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Department(dept) => dept.as_str(),
            Self::Progress => "Progress",
        }
    }

    /// Parses a wire name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("progress") {
            Some(Self::Progress)
        } else {
            Department::parse(name).map(Self::Department)
        }
    }

    /// Returns the corpus department, if this target is one.
    #[must_use]
    pub const fn department(self) -> Option<Department> {
        match self {
            Self::Department(dept) => Some(dept),
            Self::Progress => None,
        }
    }
}

impl std::fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RouteTarget> for String {
    fn from(target: RouteTarget) -> Self {
        target.as_str().to_string()
    }
}

impl TryFrom<String> for RouteTarget {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown route target: {value}"))
    }
}

/// The router's decision for one query.
///
/// Deterministic: identical input yields an identical decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Department the classifier predicted.
    pub predicted_department: Department,
    /// Probability of the predicted class, in `[0, 1]`.
    pub prediction_confidence: f32,
    /// Handler the query is dispatched to.
    pub final_department: RouteTarget,
    /// All departments the query spans, in detection order. More than
    /// one entry means multi-intent fan-out.
    pub departments: Vec<Department>,
    /// Whether a rule overrode the classifier's choice.
    pub was_overridden: bool,
    /// Human-readable reason for the override, when one applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_reason: Option<String>,
    /// Whether the query spans multiple departments.
    pub is_multi_intent: bool,
}

impl RoutingDecision {
    /// Creates a default decision for keyword-only mode: predicted
    /// General with zero confidence.
    #[must_use]
    pub fn keyword_only() -> Self {
        Self {
            predicted_department: Department::General,
            prediction_confidence: 0.0,
            final_department: RouteTarget::Department(Department::General),
            departments: Vec::new(),
            was_overridden: false,
            override_reason: None,
            is_multi_intent: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_target_wire_names() {
        assert_eq!(RouteTarget::Progress.as_str(), "Progress");
        assert_eq!(RouteTarget::Department(Department::Hr).as_str(), "HR");
    }

    #[test]
    fn test_route_target_parse() {
        assert_eq!(RouteTarget::parse("progress"), Some(RouteTarget::Progress));
        assert_eq!(
            RouteTarget::parse("HR"),
            Some(RouteTarget::Department(Department::Hr))
        );
        assert_eq!(RouteTarget::parse("Legal"), None);
    }

    #[test]
    fn test_route_target_serde_as_string() {
        let json = serde_json::to_string(&RouteTarget::Progress).unwrap();
        assert_eq!(json, "\"Progress\"");
        let back: RouteTarget = serde_json::from_str("\"IT\"").unwrap();
        assert_eq!(back, RouteTarget::Department(Department::It));
    }

    #[test]
    fn test_progress_has_no_department() {
        assert!(RouteTarget::Progress.department().is_none());
        assert_eq!(
            RouteTarget::Department(Department::Finance).department(),
            Some(Department::Finance)
        );
    }

    #[test]
    fn test_keyword_only_decision() {
        let decision = RoutingDecision::keyword_only();
        assert_eq!(decision.predicted_department, Department::General);
        assert!(decision.prediction_confidence.abs() < f32::EPSILON);
        assert!(!decision.was_overridden);
    }
}
