//! Query-side context types: language, user profile, chat turns, tasks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Supported query languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    En,
    /// Arabic.
    Ar,
}

impl Language {
    /// Detects the dominant script of a query.
    ///
    /// Counts characters in the Arabic Unicode blocks against Latin
    /// letters; the majority wins, defaulting to English.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        let mut arabic = 0usize;
        let mut latin = 0usize;
        for c in text.chars() {
            if matches!(c, '\u{0600}'..='\u{06FF}' | '\u{0750}'..='\u{077F}' | '\u{08A0}'..='\u{08FF}')
            {
                arabic += 1;
            } else if c.is_ascii_alphabetic() {
                latin += 1;
            }
        }
        if arabic > latin { Self::Ar } else { Self::En }
    }

    /// Returns the BCP-47 style code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
        }
    }
}

/// Profile of the user asking the question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// Display name.
    pub name: String,
    /// Job role (e.g. "Junior Backend Engineer").
    pub role: String,
    /// Work department label.
    pub department: String,
    /// Access level (`new_hire`, `admin`).
    #[serde(default = "default_user_type")]
    pub user_type: String,
    /// Preferred language override; detected from the query when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

fn default_user_type() -> String {
    "new_hire".to_string()
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "User".to_string(),
            role: "Employee".to_string(),
            department: "General".to_string(),
            user_type: default_user_type(),
            language: None,
        }
    }
}

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The user's message.
    User,
    /// The copilot's reply.
    Assistant,
}

/// A single conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who produced the turn.
    pub role: ChatRole,
    /// Turn content.
    pub content: String,
}

impl ChatTurn {
    /// Creates a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Status of an onboarding task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Not yet begun.
    NotStarted,
    /// Begun but not finished.
    InProgress,
    /// Finished.
    Done,
}

impl TaskStatus {
    /// Returns the wire form (`NOT_STARTED`, `IN_PROGRESS`, `DONE`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Done => "DONE",
        }
    }
}

/// An onboarding task supplied by the request boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task identifier.
    pub id: i64,
    /// Task title (e.g. "Set up MFA on Okta").
    pub title: String,
    /// Current status.
    pub status: TaskStatus,
    /// Optional due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}
