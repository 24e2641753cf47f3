//! `OpenAI` generator implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, local proxies)
//! via the base URL override in [`Settings`].

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequest,
};
use async_trait::async_trait;

use crate::agent::provider::{GenerationRequest, GenerationResponse, TextGenerator, TokenUsage};
use crate::config::Settings;
use crate::error::AgentError;

/// `OpenAI`-compatible text generator.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
}

impl OpenAiGenerator {
    /// Creates a generator from settings.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] when no API key is
    /// configured.
    pub fn new(settings: &Settings) -> Result<Self, AgentError> {
        if settings.api_key.is_empty() {
            return Err(AgentError::ApiKeyMissing);
        }
        let mut config = OpenAIConfig::new().with_api_key(&settings.api_key);
        if let Some(ref base_url) = settings.base_url {
            config = config.with_api_base(base_url);
        }
        Ok(Self {
            client: Client::with_config(config),
        })
    }

    fn build_request(request: &GenerationRequest) -> CreateChatCompletionRequest {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: async_openai::types::ChatCompletionRequestSystemMessageContent::Text(
                    request.system_prompt.clone(),
                ),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(
                    request.user_prompt.clone(),
                ),
                name: None,
            }),
        ];

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: Some(request.temperature),
            max_completion_tokens: Some(request.max_tokens),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for OpenAiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiGenerator")
            .field("client", &"<async-openai::Client>")
            .finish()
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = self
            .client
            .chat()
            .create(openai_request)
            .await
            .map_err(|e| AgentError::Generation {
                reason: e.to_string(),
            })?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        Ok(GenerationResponse { content, usage })
    }
}
