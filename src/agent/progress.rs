//! Progress handler: onboarding task tracking, timelines, and
//! recommendations.
//!
//! The only handler that never calls retrieval. It summarizes the
//! caller-provided task list, buckets due dates into a timeline,
//! recommends dependency-ready next tasks, and parses an optional
//! trailing task-update JSON block from the completion.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate};
use serde::Deserialize;
use tracing::debug;

use crate::Result;
use crate::agent::prompt::{PROGRESS_SYSTEM_PROMPT, PROGRESS_USER_PROMPT};
use crate::agent::provider::{GenerationRequest, TextGenerator};
use crate::agent::traits::{Agent, AgentResponse, RequestState, TaskUpdate};
use crate::config::Settings;
use crate::core::{ConversationMemory, RouteTarget, TaskRecord, TaskStatus};
use crate::error::AgentError;

/// Completion budget for progress answers.
const ANSWER_MAX_TOKENS: u32 = 2048;

/// Maximum recommendations surfaced per response.
const MAX_RECOMMENDATIONS: usize = 3;

/// Fallback estimate for tasks without a known duration.
const DEFAULT_ESTIMATE: &str = "15-30 minutes";

/// Task prerequisites: a task is only recommended once every
/// prerequisite title is complete.
const TASK_DEPENDENCIES: &[(&str, &[&str])] = &[
    ("Set up MFA on Okta", &["Set up laptop and accounts"]),
    ("Configure VPN access", &["Set up MFA on Okta"]),
    ("Install required software", &["Set up laptop and accounts"]),
    (
        "Complete Security Awareness training",
        &["Sign NDA and confidentiality agreement"],
    ),
    (
        "Complete Data Protection training",
        &["Complete Security Awareness training"],
    ),
    ("Set up Expensify account", &["Set up direct deposit"]),
    ("Review expense policy", &["Set up Expensify account"]),
    (
        "Enroll in benefits",
        &["Complete HR orientation session", "Submit W-4 and I-9 forms"],
    ),
];

/// Estimated durations for common onboarding tasks.
const TASK_ESTIMATED_TIMES: &[(&str, &str)] = &[
    ("Complete HR orientation session", "1-2 hours"),
    ("Review and sign employee handbook", "30-45 minutes"),
    ("Submit W-4 and I-9 forms", "15-20 minutes"),
    ("Set up direct deposit", "10-15 minutes"),
    ("Enroll in benefits", "30-60 minutes"),
    ("Set up laptop and accounts", "30-45 minutes"),
    ("Configure email and calendar", "15-20 minutes"),
    ("Set up MFA on Okta", "10-15 minutes"),
    ("Install required software", "20-30 minutes"),
    ("Configure VPN access", "15-20 minutes"),
    ("Sign NDA and confidentiality agreement", "15-20 minutes"),
    ("Complete Security Awareness training", "45-60 minutes"),
    ("Complete Data Protection training", "30-45 minutes"),
    ("Complete Phishing Prevention training", "20-30 minutes"),
    ("Set up Expensify account", "10-15 minutes"),
    ("Review expense policy", "15-20 minutes"),
    ("Set up Concur travel profile", "15-20 minutes"),
];

/// Recommendation priority, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskPriority {
    /// Due next week or later.
    Low,
    /// Due this week.
    Medium,
    /// Due today or tomorrow.
    High,
    /// Overdue.
    Critical,
}

/// A recommended next task with its reasoning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRecommendation {
    /// Task identifier.
    pub task_id: i64,
    /// Task title.
    pub title: String,
    /// Why this task is recommended now.
    pub reason: String,
    /// Priority bucket.
    pub priority: TaskPriority,
    /// Estimated duration.
    pub estimated_time: &'static str,
}

/// Tasks bucketed by due date relative to today.
#[derive(Debug, Clone, Default)]
pub struct TimelineView {
    /// Past due.
    pub overdue: Vec<TaskRecord>,
    /// Due today.
    pub today: Vec<TaskRecord>,
    /// Due by the end of this week.
    pub this_week: Vec<TaskRecord>,
    /// Due by the end of next week.
    pub next_week: Vec<TaskRecord>,
    /// Due later, or without a due date.
    pub later: Vec<TaskRecord>,
}

/// Buckets pending tasks by due date.
#[must_use]
pub fn build_timeline(tasks: &[TaskRecord], today: NaiveDate) -> TimelineView {
    let days_into_week = u64::from(today.weekday().num_days_from_monday());
    let end_of_week = today
        .checked_add_days(Days::new(6 - days_into_week))
        .unwrap_or(today);
    let end_of_next_week = end_of_week.checked_add_days(Days::new(7)).unwrap_or(end_of_week);

    let mut timeline = TimelineView::default();
    for task in tasks {
        if task.status == TaskStatus::Done {
            continue;
        }
        let Some(due) = task.due_date else {
            timeline.later.push(task.clone());
            continue;
        };
        if due < today {
            timeline.overdue.push(task.clone());
        } else if due == today {
            timeline.today.push(task.clone());
        } else if due <= end_of_week {
            timeline.this_week.push(task.clone());
        } else if due <= end_of_next_week {
            timeline.next_week.push(task.clone());
        } else {
            timeline.later.push(task.clone());
        }
    }
    timeline
}

/// Formats the timeline as prompt text.
#[must_use]
pub fn format_timeline(timeline: &TimelineView) -> String {
    let mut lines: Vec<String> = Vec::new();

    if !timeline.overdue.is_empty() {
        lines.push("⚠️ **OVERDUE** (Needs immediate attention):".to_string());
        for task in &timeline.overdue {
            let due = task.due_date.map_or_else(String::new, |d| d.to_string());
            lines.push(format!("  • {} (Was due: {due})", task.title));
        }
    }
    if !timeline.today.is_empty() {
        lines.push("\n📅 **DUE TODAY**:".to_string());
        for task in &timeline.today {
            lines.push(format!("  • {}", task.title));
        }
    }
    if !timeline.this_week.is_empty() {
        lines.push("\n📆 **THIS WEEK**:".to_string());
        for task in &timeline.this_week {
            let day = task
                .due_date
                .map_or_else(String::new, |d| d.format("%A").to_string());
            lines.push(format!("  • {} ({day})", task.title));
        }
    }
    if !timeline.next_week.is_empty() {
        lines.push("\n📅 **NEXT WEEK**:".to_string());
        for task in &timeline.next_week {
            lines.push(format!("  • {}", task.title));
        }
    }
    if lines.is_empty() {
        lines.push("No urgent tasks! Great progress! 🎉".to_string());
    }

    lines.join("\n")
}

/// Summarizes task counts and completion percentage.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_tasks_summary(tasks: &[TaskRecord], today: NaiveDate) -> String {
    if tasks.is_empty() {
        return "No onboarding tasks assigned yet.".to_string();
    }
    let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    let in_progress = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::InProgress)
        .count();
    let not_started = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::NotStarted)
        .count();
    let overdue = tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Done && t.due_date.is_some_and(|d| d < today))
        .count();
    let percent = ((done as f64 / tasks.len() as f64) * 100.0).round() as u32;

    format!(
        "{done} of {} tasks complete ({percent}%). {in_progress} in progress, {not_started} not \
         started, {overdue} overdue.",
        tasks.len()
    )
}

fn estimated_time(title: &str) -> &'static str {
    TASK_ESTIMATED_TIMES
        .iter()
        .find(|(task, _)| *task == title)
        .map_or(DEFAULT_ESTIMATE, |(_, estimate)| estimate)
}

/// Whether every prerequisite of `title` is complete.
fn dependencies_met(title: &str, completed: &[&str]) -> bool {
    TASK_DEPENDENCIES
        .iter()
        .find(|(task, _)| *task == title)
        .is_none_or(|(_, prerequisites)| {
            prerequisites.iter().all(|p| completed.contains(p))
        })
}

/// Whether `title` is a prerequisite of any pending task.
fn unlocks_other_tasks(title: &str, pending: &[&TaskRecord]) -> bool {
    TASK_DEPENDENCIES.iter().any(|(task, prerequisites)| {
        prerequisites.contains(&title) && pending.iter().any(|t| t.title == *task)
    })
}

/// Whether a task is a quick win (≤ 20 minutes estimated).
fn is_quick_win(title: &str) -> bool {
    matches!(estimated_time(title), "10-15 minutes" | "15-20 minutes")
}

/// Picks the next tasks to work on, priority ordered: overdue >
/// due-today > in-progress > unlocks-others > quick-win. Tasks with
/// unmet prerequisites are excluded.
#[must_use]
pub fn recommend_tasks(tasks: &[TaskRecord], today: NaiveDate) -> Vec<TaskRecommendation> {
    let completed: Vec<&str> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .map(|t| t.title.as_str())
        .collect();
    let pending: Vec<&TaskRecord> = tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Done)
        .collect();

    let mut scored: Vec<(u8, TaskRecommendation)> = Vec::new();
    for task in &pending {
        if !dependencies_met(&task.title, &completed) {
            continue;
        }

        let overdue = task.due_date.is_some_and(|d| d < today);
        let due_today = task.due_date.is_some_and(|d| d == today);

        let (score, reason, priority) = if overdue {
            let due = task.due_date.map_or_else(String::new, |d| d.to_string());
            (5, format!("Overdue since {due}"), TaskPriority::Critical)
        } else if due_today {
            (4, "Due today".to_string(), TaskPriority::High)
        } else if task.status == TaskStatus::InProgress {
            (
                3,
                "Already in progress - finish it off".to_string(),
                TaskPriority::Medium,
            )
        } else if unlocks_other_tasks(&task.title, &pending) {
            (
                2,
                "Unblocks other onboarding tasks".to_string(),
                TaskPriority::Medium,
            )
        } else if is_quick_win(&task.title) {
            (1, "Quick win".to_string(), TaskPriority::Low)
        } else {
            (0, "Next on your list".to_string(), TaskPriority::Low)
        };

        scored.push((
            score,
            TaskRecommendation {
                task_id: task.id,
                title: task.title.clone(),
                reason,
                priority,
                estimated_time: estimated_time(&task.title),
            },
        ));
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.task_id.cmp(&b.1.task_id)));
    scored
        .into_iter()
        .take(MAX_RECOMMENDATIONS)
        .map(|(_, rec)| rec)
        .collect()
}

fn format_recommendations(recommendations: &[TaskRecommendation]) -> String {
    if recommendations.is_empty() {
        return "All caught up - no pending tasks are unblocked right now.".to_string();
    }
    recommendations
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            format!(
                "{}. {} - {} (est. {})",
                i + 1,
                rec.title,
                rec.reason,
                rec.estimated_time
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Deserialize)]
struct TaskUpdateEnvelope {
    task_update: TaskUpdate,
}

/// Parses the trailing `{"task_update": ...}` JSON block from a
/// completion. Returns the cleaned content and the update, if any;
/// malformed blocks are silently dropped.
#[must_use]
pub fn extract_task_update(content: &str) -> (String, Option<TaskUpdate>) {
    let Some(start) = content.rfind("{\"task_update\"") else {
        return (content.to_string(), None);
    };
    let Some(end) = content[start..].find("}}") else {
        return (content.to_string(), None);
    };
    let block = &content[start..start + end + 2];

    match serde_json::from_str::<TaskUpdateEnvelope>(block) {
        Ok(envelope) => {
            let mut cleaned = format!("{}{}", &content[..start], &content[start + end + 2..]);
            // Drop an emptied fenced block left around the JSON
            cleaned = cleaned.replace("```json\n\n```", "");
            cleaned = cleaned.replace("```json\n```", "");
            (cleaned.trim_end().to_string(), Some(envelope.task_update))
        }
        Err(err) => {
            debug!(error = %err, "dropping malformed task update block");
            (content.to_string(), None)
        }
    }
}

/// Task-tracking handler for the Progress pseudo-department.
pub struct ProgressAgent {
    generator: Arc<dyn TextGenerator>,
    memory: Arc<ConversationMemory>,
    settings: Settings,
}

impl ProgressAgent {
    /// Creates the progress handler.
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        memory: Arc<ConversationMemory>,
        settings: Settings,
    ) -> Self {
        Self {
            generator,
            memory,
            settings,
        }
    }
}

#[async_trait]
impl Agent for ProgressAgent {
    fn target(&self) -> RouteTarget {
        RouteTarget::Progress
    }

    fn label(&self) -> &'static str {
        "progress"
    }

    async fn handle(&self, state: &RequestState) -> Result<AgentResponse> {
        let timeline = build_timeline(&state.tasks, state.today);
        let recommendations = recommend_tasks(&state.tasks, state.today);

        let system_prompt = PROGRESS_SYSTEM_PROMPT.render(&[
            ("user_name", &state.profile.name),
            ("user_role", &state.profile.role),
            ("user_department", &state.profile.department),
            (
                "tasks_summary",
                &format_tasks_summary(&state.tasks, state.today),
            ),
            ("timeline_view", &format_timeline(&timeline)),
            ("recommendations", &format_recommendations(&recommendations)),
        ])?;
        let user_prompt = PROGRESS_USER_PROMPT.render(&[("question", &state.message)])?;

        let request = GenerationRequest {
            model: self.settings.llm_model.clone(),
            system_prompt,
            user_prompt,
            temperature: self.settings.llm_temperature,
            max_tokens: ANSWER_MAX_TOKENS,
        };

        let generation = tokio::time::timeout(
            self.settings.generator_timeout,
            self.generator.generate(&request),
        )
        .await
        .map_err(|_| AgentError::Timeout {
            seconds: self.settings.generator_timeout.as_secs(),
        })??;

        let (content, task_update) = extract_task_update(&generation.content);

        self.memory
            .record_exchange(state.user_id, &state.message, &content);

        let mut response = AgentResponse::without_retrieval(content);
        response.task_updates = task_update.into_iter().collect();
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::provider::{GenerationResponse, TokenUsage};
    use crate::core::UserProfile;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(id: i64, title: &str, status: TaskStatus, due: Option<NaiveDate>) -> TaskRecord {
        TaskRecord {
            id,
            title: title.to_string(),
            status,
            due_date: due,
        }
    }

    // Monday 2025-02-03 makes week boundaries deterministic
    fn today() -> NaiveDate {
        date(2025, 2, 3)
    }

    #[test]
    fn test_timeline_buckets() {
        let tasks = vec![
            task(1, "Overdue task", TaskStatus::NotStarted, Some(date(2025, 1, 30))),
            task(2, "Today task", TaskStatus::NotStarted, Some(today())),
            task(3, "This week", TaskStatus::NotStarted, Some(date(2025, 2, 7))),
            task(4, "Next week", TaskStatus::NotStarted, Some(date(2025, 2, 12))),
            task(5, "Later", TaskStatus::NotStarted, Some(date(2025, 3, 1))),
            task(6, "No due date", TaskStatus::NotStarted, None),
            task(7, "Done task", TaskStatus::Done, Some(date(2025, 1, 1))),
        ];

        let timeline = build_timeline(&tasks, today());
        assert_eq!(timeline.overdue.len(), 1);
        assert_eq!(timeline.today.len(), 1);
        assert_eq!(timeline.this_week.len(), 1);
        assert_eq!(timeline.next_week.len(), 1);
        assert_eq!(timeline.later.len(), 2);
    }

    #[test]
    fn test_timeline_format_mentions_overdue() {
        let tasks = vec![task(
            1,
            "Submit W-4 and I-9 forms",
            TaskStatus::NotStarted,
            Some(date(2025, 1, 30)),
        )];
        let formatted = format_timeline(&build_timeline(&tasks, today()));
        assert!(formatted.contains("OVERDUE"));
        assert!(formatted.contains("Submit W-4 and I-9 forms"));
    }

    #[test]
    fn test_timeline_format_empty() {
        let formatted = format_timeline(&build_timeline(&[], today()));
        assert!(formatted.contains("No urgent tasks"));
    }

    #[test]
    fn test_tasks_summary() {
        let tasks = vec![
            task(1, "A", TaskStatus::Done, None),
            task(2, "B", TaskStatus::InProgress, None),
            task(3, "C", TaskStatus::NotStarted, Some(date(2025, 1, 1))),
            task(4, "D", TaskStatus::NotStarted, None),
        ];
        let summary = format_tasks_summary(&tasks, today());
        assert!(summary.contains("1 of 4"));
        assert!(summary.contains("25%"));
        assert!(summary.contains("1 overdue"));
    }

    #[test]
    fn test_recommendations_prefer_overdue() {
        let tasks = vec![
            task(1, "Set up direct deposit", TaskStatus::NotStarted, Some(date(2025, 1, 30))),
            task(2, "Configure email and calendar", TaskStatus::NotStarted, Some(date(2025, 3, 1))),
        ];
        let recommendations = recommend_tasks(&tasks, today());
        assert_eq!(recommendations[0].task_id, 1);
        assert_eq!(recommendations[0].priority, TaskPriority::Critical);
        assert!(recommendations[0].reason.contains("Overdue"));
    }

    #[test]
    fn test_recommendations_respect_dependencies() {
        // VPN requires MFA, which requires the laptop setup; only the
        // laptop task is unblocked.
        let tasks = vec![
            task(1, "Configure VPN access", TaskStatus::NotStarted, None),
            task(2, "Set up MFA on Okta", TaskStatus::NotStarted, None),
            task(3, "Set up laptop and accounts", TaskStatus::NotStarted, None),
        ];
        let recommendations = recommend_tasks(&tasks, today());
        let titles: Vec<&str> = recommendations.iter().map(|r| r.title.as_str()).collect();
        assert!(titles.contains(&"Set up laptop and accounts"));
        assert!(!titles.contains(&"Configure VPN access"));
        assert!(!titles.contains(&"Set up MFA on Okta"));
    }

    #[test]
    fn test_recommendations_unlock_after_completion() {
        let tasks = vec![
            task(1, "Set up laptop and accounts", TaskStatus::Done, None),
            task(2, "Set up MFA on Okta", TaskStatus::NotStarted, None),
        ];
        let recommendations = recommend_tasks(&tasks, today());
        assert_eq!(recommendations[0].title, "Set up MFA on Okta");
        assert_eq!(recommendations[0].estimated_time, "10-15 minutes");
    }

    #[test]
    fn test_recommendations_in_progress_over_quick_win() {
        let tasks = vec![
            task(1, "Set up direct deposit", TaskStatus::NotStarted, None),
            task(2, "Review and sign employee handbook", TaskStatus::InProgress, None),
        ];
        let recommendations = recommend_tasks(&tasks, today());
        assert_eq!(recommendations[0].task_id, 2);
        assert!(recommendations[0].reason.contains("in progress"));
    }

    #[test]
    fn test_extract_task_update() {
        let content = "Great job finishing MFA!\n\n```json\n{\"task_update\": {\"task_id\": 3, \
                       \"new_status\": \"DONE\"}}\n```";
        let (cleaned, update) = extract_task_update(content);
        let update = update.unwrap();
        assert_eq!(update.task_id, 3);
        assert_eq!(update.new_status, TaskStatus::Done);
        assert!(!cleaned.contains("task_update"));
        assert!(cleaned.contains("Great job"));
    }

    #[test]
    fn test_extract_task_update_absent() {
        let (cleaned, update) = extract_task_update("No update here.");
        assert!(update.is_none());
        assert_eq!(cleaned, "No update here.");
    }

    #[test]
    fn test_extract_task_update_malformed_dropped() {
        let content = "Done!\n{\"task_update\": {\"task_id\": \"not a number\"}}";
        let (cleaned, update) = extract_task_update(content);
        assert!(update.is_none());
        assert_eq!(cleaned, content);
    }

    struct CannedGenerator(&'static str);

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> std::result::Result<GenerationResponse, AgentError> {
            Ok(GenerationResponse {
                content: self.0.to_string(),
                usage: TokenUsage::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_handle_parses_task_update() {
        let agent = ProgressAgent::new(
            Arc::new(CannedGenerator(
                "Nice work on MFA!\n\n```json\n{\"task_update\": {\"task_id\": 3, \
                 \"new_status\": \"DONE\"}}\n```",
            )),
            Arc::new(ConversationMemory::new(10)),
            Settings::default(),
        );

        let state = RequestState::new(1, "I finished setting up MFA", UserProfile::default())
            .with_tasks(vec![task(
                3,
                "Set up MFA on Okta",
                TaskStatus::InProgress,
                None,
            )])
            .with_today(today());

        let response = agent.handle(&state).await.unwrap();
        assert_eq!(response.task_updates.len(), 1);
        assert_eq!(response.task_updates[0].task_id, 3);
        assert_eq!(response.task_updates[0].new_status, TaskStatus::Done);
        assert!(response.sources.is_empty());
        assert_eq!(agent.label(), "progress");
    }

    #[tokio::test]
    async fn test_handle_without_update() {
        let agent = ProgressAgent::new(
            Arc::new(CannedGenerator("Here's your progress summary.")),
            Arc::new(ConversationMemory::new(10)),
            Settings::default(),
        );
        let state = RequestState::new(1, "show my progress", UserProfile::default())
            .with_today(today());

        let response = agent.handle(&state).await.unwrap();
        assert!(response.task_updates.is_empty());
        assert_eq!(response.content, "Here's your progress summary.");
    }
}
