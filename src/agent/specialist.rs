//! Department specialist handler.
//!
//! One instance per corpus department. The shared plumbing lives here
//! by composition: query translation, department-filtered retrieval
//! with an unfiltered retry, context formatting, prompt rendering,
//! generation, and confidence. Each department differs only in its
//! label and system prompt.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::Result;
use crate::agent::prompt::{
    ARABIC_INSTRUCTION, ENGLISH_INSTRUCTION, SPECIALIST_USER_PROMPT, system_prompt_for,
};
use crate::agent::provider::{GenerationRequest, TextGenerator};
use crate::agent::traits::{Agent, AgentResponse, RequestState};
use crate::config::Settings;
use crate::confidence::score_confidence;
use crate::core::{ChunkSource, ConversationMemory, Department, Language, RouteTarget};
use crate::error::AgentError;
use crate::route::translate_arabic_query;
use crate::search::{HybridResponse, HybridSearchEngine};

/// Completion budget for specialist answers.
const ANSWER_MAX_TOKENS: u32 = 2048;

/// How many conversation turns feed the prompt context.
const CONTEXT_TURNS: usize = 3;

/// Retrieval-grounded handler for one corpus department.
pub struct SpecialistAgent {
    department: Department,
    search: Arc<HybridSearchEngine>,
    generator: Arc<dyn TextGenerator>,
    memory: Arc<ConversationMemory>,
    settings: Settings,
}

impl SpecialistAgent {
    /// Creates the handler for a department.
    #[must_use]
    pub fn new(
        department: Department,
        search: Arc<HybridSearchEngine>,
        generator: Arc<dyn TextGenerator>,
        memory: Arc<ConversationMemory>,
        settings: Settings,
    ) -> Self {
        Self {
            department,
            search,
            generator,
            memory,
            settings,
        }
    }

    /// Picks the retrieval query: Arabic queries go through the static
    /// keyword translation map because the corpus is English.
    fn search_query(state: &RequestState) -> String {
        if state.language == Language::Ar
            && let Some(translated) = translate_arabic_query(&state.message)
        {
            debug!(translated = %translated, "translated Arabic query for retrieval");
            return translated;
        }
        state.message.clone()
    }

    /// Retrieves with the department filter, retrying unfiltered when
    /// the department's slice of the corpus has nothing.
    fn retrieve(&self, query: &str) -> HybridResponse {
        let filtered = self
            .search
            .search(query, self.settings.top_k_retrieval, Some(self.department));
        if !filtered.results.is_empty() {
            return filtered;
        }
        debug!(department = %self.department, "no department-filtered results, retrying unfiltered");
        self.search.search(query, self.settings.top_k_retrieval, None)
    }

    /// Formats retrieved chunks as prompt context with per-chunk
    /// headers.
    fn format_context(retrieval: &HybridResponse) -> String {
        if retrieval.results.is_empty() {
            return "No relevant documents found.".to_string();
        }
        retrieval
            .results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                format!(
                    "[Document {}] Source: {} | Section: {} | Department: {}\n{}",
                    i + 1,
                    result.chunk.filename,
                    result.chunk.section_title,
                    result.chunk.department,
                    result.chunk.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    /// Deduplicates citations, preserving retrieval order.
    fn collect_sources(retrieval: &HybridResponse) -> Vec<ChunkSource> {
        let mut sources: Vec<ChunkSource> = Vec::new();
        for result in &retrieval.results {
            let source = result.chunk.source();
            if !sources.contains(&source) {
                sources.push(source);
            }
        }
        sources
    }
}

#[async_trait]
impl Agent for SpecialistAgent {
    fn target(&self) -> RouteTarget {
        RouteTarget::Department(self.department)
    }

    fn label(&self) -> &'static str {
        match self.department {
            Department::Hr => "hr",
            Department::It => "it",
            Department::Security => "security",
            Department::Finance => "finance",
            Department::General => "general",
        }
    }

    async fn handle(&self, state: &RequestState) -> Result<AgentResponse> {
        let search_query = Self::search_query(state);
        let retrieval = self.retrieve(&search_query);
        let context = Self::format_context(&retrieval);
        let sources = Self::collect_sources(&retrieval);

        let (language_instruction, response_language) = match state.language {
            Language::Ar => (ARABIC_INSTRUCTION, "Respond in Arabic (العربية)."),
            Language::En => (ENGLISH_INSTRUCTION, ""),
        };

        let conversation_context = self.memory.context_string(state.user_id, CONTEXT_TURNS);
        let system_prompt = system_prompt_for(self.department).render(&[
            ("language_instruction", language_instruction),
            ("user_name", &state.profile.name),
            ("user_role", &state.profile.role),
            ("user_department", &state.profile.department),
            ("conversation_context", &conversation_context),
            ("context", &context),
        ])?;
        let user_prompt = SPECIALIST_USER_PROMPT.render(&[
            ("question", &state.message),
            ("response_language", response_language),
        ])?;

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

        let combined: Vec<f32> = retrieval
            .results
            .iter()
            .map(|r| r.combined_score)
            .collect();
        let (confidence, confidence_score) = score_confidence(
            &combined,
            self.settings.confidence_high_threshold,
            self.settings.confidence_medium_threshold,
        );

        self.memory
            .record_exchange(state.user_id, &state.message, &generation.content);

        Ok(AgentResponse {
            content: generation.content,
            sources,
            task_updates: Vec::new(),
            confidence,
            confidence_score,
            documents_found: retrieval.results.len(),
        })
    }
}
