//! Agent trait and shared request/response types.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::confidence::ConfidenceLevel;
use crate::core::{ChatTurn, ChunkSource, Language, RouteTarget, TaskRecord, TaskStatus, UserProfile};

/// A task status change parsed from a Progress handler response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    /// Task to update.
    pub task_id: i64,
    /// New status.
    pub new_status: TaskStatus,
}

/// Read-only per-request state shared across fan-out handlers.
#[derive(Debug, Clone)]
pub struct RequestState {
    /// Requesting user.
    pub user_id: i64,
    /// The user's message.
    pub message: String,
    /// User profile from the boundary.
    pub profile: UserProfile,
    /// Detected query language.
    pub language: Language,
    /// The user's onboarding tasks.
    pub tasks: Vec<TaskRecord>,
    /// Recent conversation turns supplied by the boundary.
    pub history: Vec<ChatTurn>,
    /// Today's date; injected so timeline bucketing is deterministic.
    pub today: NaiveDate,
}

impl RequestState {
    /// Creates a state for one request, detecting the language from the
    /// message unless the profile pins one.
    #[must_use]
    pub fn new(user_id: i64, message: impl Into<String>, profile: UserProfile) -> Self {
        let message = message.into();
        let language = profile.language.unwrap_or_else(|| Language::detect(&message));
        Self {
            user_id,
            message,
            profile,
            language,
            tasks: Vec::new(),
            history: Vec::new(),
            today: chrono::Utc::now().date_naive(),
        }
    }

    /// Attaches the user's task list.
    #[must_use]
    pub fn with_tasks(mut self, tasks: Vec<TaskRecord>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Attaches boundary-supplied history.
    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    /// Pins the reference date for timeline bucketing.
    #[must_use]
    pub const fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

/// Response produced by one handler.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Answer markdown.
    pub content: String,
    /// Deduplicated citations.
    pub sources: Vec<ChunkSource>,
    /// Task updates parsed from the response (Progress handler only).
    pub task_updates: Vec<TaskUpdate>,
    /// Confidence level from retrieval signals.
    pub confidence: ConfidenceLevel,
    /// Confidence score in `[0, 1]`.
    pub confidence_score: f32,
    /// How many documents retrieval returned for this answer.
    pub documents_found: usize,
}

impl AgentResponse {
    /// Creates a response with no retrieval backing (Progress handler).
    #[must_use]
    pub fn without_retrieval(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sources: Vec::new(),
            task_updates: Vec::new(),
            confidence: ConfidenceLevel::Medium,
            confidence_score: 0.5,
            documents_found: 0,
        }
    }
}

/// Contract implemented by every department handler.
///
/// Handlers are stateless with respect to a single request; they share
/// the process-wide conversation memory, which they update after
/// producing a response.
#[async_trait]
pub trait Agent: Send + Sync {
    /// The routing target this handler serves.
    fn target(&self) -> RouteTarget;

    /// Lowercase label used in the response envelope (`"hr"`, `"it"`,
    /// `"progress"`, ...).
    fn label(&self) -> &'static str;

    /// Produces a grounded answer for the request.
    ///
    /// # Errors
    ///
    /// Returns an error when retrieval or text generation fails; the
    /// orchestrator translates it into the apology response.
    async fn handle(&self, state: &RequestState) -> Result<AgentResponse>;
}
