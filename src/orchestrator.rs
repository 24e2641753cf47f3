//! Request orchestrator.
//!
//! Runs the per-request state machine: language detection → cache
//! lookup → department detection → single-handler dispatch or parallel
//! fan-out → merge → confidence and escalation → asynchronous cache
//! write. The orchestrator is the sole translator from internal errors
//! to the outward apology response.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{error, info, warn};

use crate::agent::{Agent, AgentResponse, RequestState, TaskUpdate};
use crate::cache::{CacheWriter, TwoTierCache, WriteJob};
use crate::confidence::{
    ConfidenceLevel, EscalationDirective, EscalationEngine, department_contact,
};
use crate::config::Settings;
use crate::core::{
    ChatTurn, ChunkSource, ConversationMemory, Department, RouteTarget, TaskRecord, UserProfile,
};
use crate::route::Router;
use crate::storage::SqliteStore;

/// Apology shown when a handler fails.
const APOLOGY: &str =
    "I apologize, but I encountered an error processing your request. Please try again or \
     contact support.";

#[allow(clippy::unwrap_used)]
static GREETING_STRIP_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^(Hi|Hello|Hey)[^.!]*[.!]\s*",
        r"(?i)^I'd be happy to help[^.!]*[.!]\s*",
    ]
    .iter()
    .map(|pattern| {
        Regex::new(pattern).unwrap()
    })
    .collect()
});

/// Routing block of the response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingInfo {
    /// Department the classifier predicted.
    pub predicted_department: String,
    /// Probability of the predicted class.
    pub prediction_confidence: f32,
    /// Final dispatch target (comma-joined for fan-out).
    pub final_department: String,
    /// Whether a rule overrode the classifier.
    pub was_overridden: bool,
    /// Set on cache hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_cached: Option<bool>,
    /// `"exact"` or `"semantic"` on cache hits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_type: Option<String>,
    /// Whether the query spanned multiple departments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_multi_intent: Option<bool>,
    /// Departments involved in a fan-out, in router order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departments: Option<Vec<String>>,
}

/// The boundary-facing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEnvelope {
    /// Answer markdown.
    pub response: String,
    /// Deduplicated citations.
    pub sources: Vec<ChunkSource>,
    /// Task updates parsed from the Progress handler.
    pub task_updates: Vec<TaskUpdate>,
    /// Routing metadata.
    pub routing: RoutingInfo,
    /// Label of the handler(s) that answered.
    pub agent: String,
    /// Confidence level of the answer.
    pub confidence_level: ConfidenceLevel,
    /// Confidence score in `[0, 1]`.
    pub confidence_score: f32,
    /// Optional human-escalation directive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalation: Option<EscalationDirective>,
    /// Total wall time.
    pub total_time_ms: f64,
    /// Error string on the apology path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Orchestrates the full request pipeline.
///
/// Owns the process-scoped dependencies: router, handlers, the two-tier
/// cache, the escalation engine, and the best-effort persistence of
/// messages and routing decisions.
pub struct Orchestrator {
    router: Router,
    handlers: HashMap<RouteTarget, Arc<dyn Agent>>,
    cache: Arc<TwoTierCache>,
    cache_writer: CacheWriter,
    escalation: EscalationEngine,
    memory: Arc<ConversationMemory>,
    store: Arc<SqliteStore>,
    settings: Settings,
}

impl Orchestrator {
    /// Creates the orchestrator and spawns the background cache writer.
    ///
    /// Must be called within a tokio runtime. Handlers are registered by
    /// their routing target; `General` dispatches to the Progress
    /// handler, as general chit-chat is answered from task state rather
    /// than retrieval.
    #[must_use]
    pub fn new(
        router: Router,
        handlers: Vec<Arc<dyn Agent>>,
        cache: Arc<TwoTierCache>,
        memory: Arc<ConversationMemory>,
        store: Arc<SqliteStore>,
        settings: Settings,
    ) -> Self {
        let cache_writer = CacheWriter::spawn(Arc::clone(&cache));
        let escalation = EscalationEngine::new(settings.escalation_threshold);
        let handlers = handlers
            .into_iter()
            .map(|handler| (handler.target(), handler))
            .collect();
        Self {
            router,
            handlers,
            cache,
            cache_writer,
            escalation,
            memory,
            store,
            settings,
        }
    }

    fn handler_for(&self, target: RouteTarget) -> Option<&Arc<dyn Agent>> {
        self.handlers.get(&target).or_else(|| {
            // General queries are served by the Progress handler
            (target == RouteTarget::Department(Department::General))
                .then(|| self.handlers.get(&RouteTarget::Progress))
                .flatten()
        })
    }

    /// Processes one user message end to end. Never errors: failures
    /// surface as the apology envelope.
    pub async fn process(
        &self,
        user_id: i64,
        message: &str,
        profile: UserProfile,
        tasks: Vec<TaskRecord>,
        history: Vec<ChatTurn>,
    ) -> AnswerEnvelope {
        let start = Instant::now();

        if message.trim().is_empty() {
            return Self::apology_envelope(
                RouteTarget::Department(Department::General),
                "empty query".to_string(),
            );
        }

        let state = RequestState::new(user_id, message, profile)
            .with_tasks(tasks)
            .with_history(history);
        info!(
            user_id,
            language = state.language.code(),
            "processing message"
        );

        // Cache lookup gates the whole pipeline
        if let Some(cached) = self.cache.get(message) {
            let department = cached.department.clone().unwrap_or_else(|| "General".to_string());
            return AnswerEnvelope {
                response: cached.response,
                sources: cached.sources,
                task_updates: Vec::new(),
                routing: RoutingInfo {
                    predicted_department: department.clone(),
                    prediction_confidence: cached.confidence,
                    final_department: department,
                    was_overridden: false,
                    is_cached: Some(true),
                    cache_type: Some(cached.cache_type.as_str().to_string()),
                    is_multi_intent: None,
                    departments: None,
                },
                agent: "cache".to_string(),
                confidence_level: self.level_for(cached.confidence),
                confidence_score: cached.confidence,
                escalation: None,
                total_time_ms: as_ms(start.elapsed()),
                error: None,
            };
        }

        // Keyword detection decides between the single-handler graph and
        // fan-out. Any non-General detection bypasses the classifier
        // graph so canonical terms route deterministically. Progress
        // intent and greetings take precedence: "I finished setting up
        // MFA" is a task update, not an IT question.
        let detected = self.router.detect_departments(message);
        let forced_progress =
            crate::route::matches_progress_intent(message) || crate::route::is_greeting(message);

        let envelope = if detected.is_empty() || forced_progress {
            self.run_single(&state, start).await
        } else {
            self.run_fan_out(&state, &detected, start).await
        };

        self.log_interaction(&state, &envelope);
        envelope
    }

    /// Single-handler path: full routing decision, one agent.
    async fn run_single(&self, state: &RequestState, start: Instant) -> AnswerEnvelope {
        let decision = self.router.route(&state.message);
        let target = decision.final_department;

        let Some(handler) = self.handler_for(target) else {
            error!(target = %target, "no handler registered");
            return Self::apology_envelope(target, format!("no handler for {target}"));
        };

        let response = match self.run_handler(handler, state).await {
            Ok(response) => response,
            Err(reason) => {
                error!(target = %target, error = %reason, "handler failed");
                return Self::apology_envelope(target, reason);
            }
        };

        let routing = RoutingInfo {
            predicted_department: decision.predicted_department.as_str().to_string(),
            prediction_confidence: decision.prediction_confidence,
            final_department: target.as_str().to_string(),
            was_overridden: decision.was_overridden,
            is_cached: None,
            cache_type: None,
            is_multi_intent: Some(false),
            departments: None,
        };

        self.finalize(
            state,
            response,
            routing,
            handler.label().to_string(),
            target,
            start,
        )
    }

    /// Fan-out path: one handler per detected department, concurrent,
    /// merged in router order.
    async fn run_fan_out(
        &self,
        state: &RequestState,
        detected: &[Department],
        start: Instant,
    ) -> AnswerEnvelope {
        let primary = RouteTarget::Department(detected[0]);
        let mut joins = Vec::with_capacity(detected.len());

        for &department in detected {
            let target = RouteTarget::Department(department);
            let Some(handler) = self.handler_for(target) else {
                warn!(target = %target, "no handler registered, skipping fan-out leg");
                continue;
            };
            let handler = Arc::clone(handler);
            let leg_state = state.clone();
            let deadline = self.settings.generator_timeout + self.settings.retrieval_timeout;
            joins.push((
                department,
                tokio::spawn(async move {
                    tokio::time::timeout(deadline, handler.handle(&leg_state)).await
                }),
            ));
        }

        // Collect in router order; legs that failed or timed out are
        // dropped so partial merges still answer.
        let mut legs: Vec<(Department, AgentResponse)> = Vec::new();
        let mut last_error = String::new();
        for (department, join) in joins {
            match join.await {
                Ok(Ok(Ok(response))) => legs.push((department, response)),
                Ok(Ok(Err(err))) => {
                    warn!(department = %department, error = %err, "fan-out handler failed");
                    last_error = err.to_string();
                }
                Ok(Err(_elapsed)) => {
                    warn!(department = %department, "fan-out handler timed out");
                    last_error = format!("{department} handler timed out");
                }
                Err(err) => {
                    warn!(department = %department, error = %err, "fan-out join failed");
                    last_error = err.to_string();
                }
            }
        }

        if legs.is_empty() {
            return Self::apology_envelope(primary, last_error);
        }

        // The router still runs for the envelope metadata (classifier
        // prediction, override flags) even though the keyword bypass
        // already fixed the dispatch targets.
        let decision = self.router.route(&state.message);
        let is_multi_intent = detected.len() > 1;
        let departments: Vec<String> = detected.iter().map(|d| d.as_str().to_string()).collect();
        let agent_label = legs
            .iter()
            .map(|(d, _)| d.as_str().to_lowercase())
            .collect::<Vec<_>>()
            .join(", ");

        let merged = merge_responses(&legs);

        let routing = RoutingInfo {
            predicted_department: decision.predicted_department.as_str().to_string(),
            prediction_confidence: decision.prediction_confidence,
            final_department: departments.join(", "),
            was_overridden: decision.was_overridden,
            is_cached: None,
            cache_type: None,
            is_multi_intent: Some(is_multi_intent),
            departments: Some(departments),
        };

        self.finalize(state, merged, routing, agent_label, primary, start)
    }

    async fn run_handler(
        &self,
        handler: &Arc<dyn Agent>,
        state: &RequestState,
    ) -> Result<AgentResponse, String> {
        let deadline = self.settings.generator_timeout + self.settings.retrieval_timeout;
        match tokio::time::timeout(deadline, handler.handle(state)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err(format!("{} handler timed out", handler.label())),
        }
    }

    /// Applies confidence, escalation, the empty-retrieval contact
    /// line, and the asynchronous cache write, then builds the
    /// envelope.
    fn finalize(
        &self,
        state: &RequestState,
        mut response: AgentResponse,
        routing: RoutingInfo,
        agent_label: String,
        contact_target: RouteTarget,
        start: Instant,
    ) -> AnswerEnvelope {
        // Empty retrieval for a policy question: point at the department
        // instead of serving an unsupported answer.
        if response.confidence == ConfidenceLevel::None && contact_target != RouteTarget::Progress
        {
            let contact = department_contact(contact_target);
            response.content = format!(
                "I couldn't find policy documentation for that question. Please contact the {} \
                 at {} ({}, {}).",
                contact.name, contact.email, contact.phone, contact.hours
            );
        }

        let recent = self
            .memory
            .recent_user_queries(state.user_id, self.settings.conversation_history_max);
        let escalation = self.escalation.evaluate(
            &state.message,
            response.confidence_score,
            response.documents_found,
            contact_target,
            &recent,
        );

        // Cache only answers with retrieval support (or progress
        // answers); contact-line fallbacks are not worth memoizing.
        if response.confidence != ConfidenceLevel::None {
            self.cache_writer.enqueue(WriteJob {
                query: state.message.clone(),
                response: response.content.clone(),
                sources: response.sources.clone(),
                department: Some(routing.final_department.clone()),
                confidence: response.confidence_score,
            });
        }

        AnswerEnvelope {
            response: response.content,
            sources: response.sources,
            task_updates: response.task_updates,
            routing,
            agent: agent_label,
            confidence_level: response.confidence,
            confidence_score: response.confidence_score,
            escalation,
            total_time_ms: as_ms(start.elapsed()),
            error: None,
        }
    }

    /// Best-effort persistence of the exchange and the routing
    /// decision. Failures are logged, never surfaced.
    fn log_interaction(&self, state: &RequestState, envelope: &AnswerEnvelope) {
        let store = Arc::clone(&self.store);
        let user_id = state.user_id;
        let message = state.message.clone();
        let response = envelope.response.clone();
        let agent = envelope.agent.clone();
        let decision = crate::core::RoutingDecision {
            predicted_department: Department::parse(&envelope.routing.predicted_department)
                .unwrap_or(Department::General),
            prediction_confidence: envelope.routing.prediction_confidence,
            final_department: RouteTarget::parse(&envelope.routing.final_department)
                .unwrap_or(RouteTarget::Department(Department::General)),
            departments: Vec::new(),
            was_overridden: envelope.routing.was_overridden,
            override_reason: None,
            is_multi_intent: envelope.routing.is_multi_intent.unwrap_or(false),
        };

        tokio::spawn(async move {
            if let Err(err) = store.append_message(user_id, "user", &message, None) {
                warn!(error = %err, "message log write failed");
            }
            if let Err(err) = store.append_message(user_id, "assistant", &response, Some(&agent)) {
                warn!(error = %err, "message log write failed");
            }
            if let Err(err) = store.append_routing_log(user_id, &message, &decision) {
                warn!(error = %err, "routing log write failed");
            }
        });
    }

    fn level_for(&self, score: f32) -> ConfidenceLevel {
        if score >= self.settings.confidence_high_threshold {
            ConfidenceLevel::High
        } else if score >= self.settings.confidence_medium_threshold {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    /// The sentinel error response: apology text, department contact,
    /// zero elapsed time, no cache write.
    fn apology_envelope(target: RouteTarget, error: String) -> AnswerEnvelope {
        let contact = department_contact(target);
        let response = format!(
            "{APOLOGY} You can also reach the {} at {} ({}).",
            contact.name, contact.email, contact.phone
        );
        AnswerEnvelope {
            response,
            sources: Vec::new(),
            task_updates: Vec::new(),
            routing: RoutingInfo {
                predicted_department: "General".to_string(),
                prediction_confidence: 0.0,
                final_department: target.as_str().to_string(),
                was_overridden: false,
                is_cached: None,
                cache_type: None,
                is_multi_intent: None,
                departments: None,
            },
            agent: String::new(),
            confidence_level: ConfidenceLevel::None,
            confidence_score: 0.0,
            escalation: None,
            total_time_ms: 0.0,
            error: Some(error),
        }
    }
}

/// Merges fan-out responses in router order.
///
/// The first response is kept verbatim; later responses are stripped of
/// leading greetings, prefixed with a department header, and joined
/// with a horizontal rule. Sources and task updates concatenate in
/// order (sources deduplicated).
fn merge_responses(legs: &[(Department, AgentResponse)]) -> AgentResponse {
    if legs.len() == 1 {
        return legs[0].1.clone();
    }

    let mut parts: Vec<String> = Vec::new();
    let mut sources: Vec<ChunkSource> = Vec::new();
    let mut task_updates: Vec<TaskUpdate> = Vec::new();
    let mut confidence_score = 0.0f32;
    let mut confidence = ConfidenceLevel::None;
    let mut documents_found = 0usize;

    for (department, response) in legs {
        let mut content = response.content.clone();
        if !parts.is_empty() {
            for re in GREETING_STRIP_RES.iter() {
                content = re.replace(&content, "").into_owned();
            }
        }
        let content = content.trim();
        if !content.is_empty() {
            parts.push(format!("**{department} Information:**\n{content}"));
        }

        for source in &response.sources {
            if !sources.contains(source) {
                sources.push(source.clone());
            }
        }
        task_updates.extend(response.task_updates.iter().cloned());
        documents_found += response.documents_found;
        if response.confidence_score > confidence_score {
            confidence_score = response.confidence_score;
            confidence = response.confidence;
        }
    }

    AgentResponse {
        content: parts.join("\n\n---\n\n"),
        sources,
        task_updates,
        confidence,
        confidence_score,
        documents_found,
    }
}

fn as_ms(duration: std::time::Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leg(department: Department, content: &str) -> (Department, AgentResponse) {
        (
            department,
            AgentResponse {
                content: content.to_string(),
                sources: vec![ChunkSource {
                    document: format!("{}_policies.md", department.as_str().to_lowercase()),
                    section: "Section".to_string(),
                    department,
                }],
                task_updates: Vec::new(),
                confidence: ConfidenceLevel::High,
                confidence_score: 0.8,
                documents_found: 2,
            },
        )
    }

    #[test]
    fn test_merge_single_leg_verbatim() {
        let legs = vec![leg(Department::Hr, "Hello! You get 20 days of PTO.")];
        let merged = merge_responses(&legs);
        assert_eq!(merged.content, "Hello! You get 20 days of PTO.");
        assert!(!merged.content.contains("Information:"));
    }

    #[test]
    fn test_merge_two_legs_sections_and_separator() {
        let legs = vec![
            leg(Department::Hr, "You get health and dental coverage."),
            leg(Department::It, "Hello! Ask IT for a laptop via the portal."),
        ];
        let merged = merge_responses(&legs);

        assert!(merged.content.contains("**HR Information:**"));
        assert!(merged.content.contains("**IT Information:**"));
        assert!(merged.content.contains("\n\n---\n\n"));
        // The greeting on the second leg is stripped
        assert!(!merged.content.contains("Hello!"));
        // Order follows the leg order
        let hr_pos = merged.content.find("HR Information").unwrap();
        let it_pos = merged.content.find("IT Information").unwrap();
        assert!(hr_pos < it_pos);
    }

    #[test]
    fn test_merge_keeps_first_greeting() {
        let legs = vec![
            leg(Department::Hr, "Hi Sara! Benefits start day one."),
            leg(Department::It, "Hi again! Laptops come from IT."),
        ];
        let merged = merge_responses(&legs);
        assert!(merged.content.contains("Hi Sara!"));
        assert!(!merged.content.contains("Hi again!"));
    }

    #[test]
    fn test_merge_concatenates_sources_in_order() {
        let legs = vec![
            leg(Department::Hr, "benefits answer"),
            leg(Department::It, "laptop answer"),
        ];
        let merged = merge_responses(&legs);
        assert_eq!(merged.sources.len(), 2);
        assert_eq!(merged.sources[0].document, "hr_policies.md");
        assert_eq!(merged.sources[1].document, "it_policies.md");
        assert_eq!(merged.documents_found, 4);
    }

    #[test]
    fn test_merge_deduplicates_sources() {
        let mut first = leg(Department::Hr, "a");
        let second = leg(Department::Hr, "b");
        first.1.sources = second.1.sources.clone();
        let merged = merge_responses(&[first, second]);
        assert_eq!(merged.sources.len(), 1);
    }

    #[test]
    fn test_merge_takes_highest_confidence() {
        let mut low = leg(Department::Hr, "a");
        low.1.confidence_score = 0.3;
        low.1.confidence = ConfidenceLevel::Low;
        let high = leg(Department::It, "b");
        let merged = merge_responses(&[low, high]);
        assert!((merged.confidence_score - 0.8).abs() < f32::EPSILON);
        assert_eq!(merged.confidence, ConfidenceLevel::High);
    }

    #[test]
    fn test_apology_envelope_shape() {
        let envelope = Orchestrator::apology_envelope(
            RouteTarget::Department(Department::It),
            "boom".to_string(),
        );
        assert!(envelope.response.starts_with(APOLOGY));
        assert!(envelope.response.contains("it-helpdesk@company.com"));
        assert!(envelope.sources.is_empty());
        assert_eq!(envelope.total_time_ms, 0.0);
        assert_eq!(envelope.error.as_deref(), Some("boom"));
        assert_eq!(envelope.confidence_level, ConfidenceLevel::None);
    }
}
