//! Pluggable text generator trait.
//!
//! The core depends only on a string-in/string-out completion contract;
//! implementations translate it into provider-specific SDK calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Token usage statistics from a completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u32,
    /// Tokens generated in the completion.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

/// A single-completion request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model identifier.
    pub model: String,
    /// System prompt pinning the handler's domain.
    pub system_prompt: String,
    /// User prompt with question and context.
    pub user_prompt: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

/// A single text completion.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Generated text.
    pub content: String,
    /// Token usage statistics.
    pub usage: TokenUsage,
}

/// Trait for text generator backends.
///
/// Implementations handle the transport layer (HTTP, SDK calls, retries)
/// while presenting a uniform interface to the handlers.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name (e.g. `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes one completion.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures, timeouts, or parse
    /// errors.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_default() {
        let usage = TokenUsage::default();
        assert_eq!(usage.total_tokens, 0);
    }

    #[tokio::test]
    async fn test_trait_object_usable() {
        struct Canned;

        #[async_trait]
        impl TextGenerator for Canned {
            fn name(&self) -> &'static str {
                "canned"
            }

            async fn generate(
                &self,
                _request: &GenerationRequest,
            ) -> Result<GenerationResponse, AgentError> {
                Ok(GenerationResponse {
                    content: "canned answer".to_string(),
                    usage: TokenUsage::default(),
                })
            }
        }

        let generator: Box<dyn TextGenerator> = Box::new(Canned);
        let response = generator
            .generate(&GenerationRequest {
                model: "test".to_string(),
                system_prompt: "sys".to_string(),
                user_prompt: "user".to_string(),
                temperature: 0.1,
                max_tokens: 128,
            })
            .await
            .unwrap();
        assert_eq!(response.content, "canned answer");
        assert_eq!(generator.name(), "canned");
    }
}
