//! Per-user conversation memory.
//!
//! A process-wide store of recent conversation turns, bounded per user.
//! Each user's deque sits behind its own lock so concurrent requests for
//! different users never contend.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use super::query::{ChatRole, ChatTurn};

/// Maximum characters of a turn included in a context string.
const CONTEXT_TRUNCATE_CHARS: usize = 200;

/// Bounded per-user conversation history.
///
/// Older turns are silently dropped once a user's history exceeds the
/// configured maximum.
#[derive(Debug)]
pub struct ConversationMemory {
    max_turns: usize,
    users: RwLock<HashMap<i64, Arc<Mutex<VecDeque<ChatTurn>>>>>,
}

impl ConversationMemory {
    /// Creates a new memory retaining at most `max_turns` per user.
    #[must_use]
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
            users: RwLock::new(HashMap::new()),
        }
    }

    fn user_deque(&self, user_id: i64) -> Arc<Mutex<VecDeque<ChatTurn>>> {
        if let Ok(users) = self.users.read()
            && let Some(deque) = users.get(&user_id)
        {
            return Arc::clone(deque);
        }
        let mut users = match self.users.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(users.entry(user_id).or_default())
    }

    /// Appends a turn to a user's history, dropping the oldest turn when
    /// the bound is exceeded.
    pub fn add_turn(&self, user_id: i64, turn: ChatTurn) {
        let deque = self.user_deque(user_id);
        let mut guard = match deque.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push_back(turn);
        while guard.len() > self.max_turns {
            guard.pop_front();
        }
    }

    /// Records a full user/assistant exchange.
    pub fn record_exchange(&self, user_id: i64, question: &str, answer: &str) {
        self.add_turn(user_id, ChatTurn::user(question));
        self.add_turn(user_id, ChatTurn::assistant(answer));
    }

    /// Returns up to `limit` most recent turns for a user, oldest first.
    #[must_use]
    pub fn history(&self, user_id: i64, limit: usize) -> Vec<ChatTurn> {
        let deque = self.user_deque(user_id);
        let guard = match deque.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let skip = guard.len().saturating_sub(limit);
        guard.iter().skip(skip).cloned().collect()
    }

    /// Returns the recent user queries, newest last. Used by the
    /// escalation engine's repeated-query check.
    #[must_use]
    pub fn recent_user_queries(&self, user_id: i64, limit: usize) -> Vec<String> {
        self.history(user_id, self.max_turns)
            .into_iter()
            .filter(|turn| turn.role == ChatRole::User)
            .map(|turn| turn.content)
            .rev()
            .take(limit)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect()
    }

    /// Formats recent turns as prompt context, truncating long turns.
    #[must_use]
    pub fn context_string(&self, user_id: i64, max_turns: usize) -> String {
        let history = self.history(user_id, max_turns);
        if history.is_empty() {
            return "No previous conversation.".to_string();
        }
        history
            .iter()
            .map(|turn| {
                let role = match turn.role {
                    ChatRole::User => "User",
                    ChatRole::Assistant => "Assistant",
                };
                let content: String = if turn.content.chars().count() > CONTEXT_TRUNCATE_CHARS {
                    let truncated: String =
                        turn.content.chars().take(CONTEXT_TRUNCATE_CHARS).collect();
                    format!("{truncated}...")
                } else {
                    turn.content.clone()
                };
                format!("{role}: {content}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Clears a user's history.
    pub fn clear(&self, user_id: i64) {
        if let Ok(mut users) = self.users.write() {
            users.remove(&user_id);
        }
    }
}
