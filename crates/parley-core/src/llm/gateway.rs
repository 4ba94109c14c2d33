//! Model gateway: the single place the chat core talks to a provider.
//!
//! Applies the fixed generation settings to every call and folds every
//! provider failure into one of two client-facing outcomes. The provider's
//! own error text is logged here and goes no further.

use std::sync::Arc;

use tracing::{Instrument, error, info_span};

use parley_types::config::ModelConfig;
use parley_types::error::ChatError;
use parley_types::llm::{CompletionRequest, LlmError, Message};

use super::box_provider::BoxLlmProvider;

/// Generation settings applied to every request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f64,
}

impl From<&ModelConfig> for GenerationSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            model: config.name.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        }
    }
}

/// Wraps a provider with fixed settings and upstream error classification.
#[derive(Debug, Clone)]
pub struct ModelGateway {
    provider: Arc<BoxLlmProvider>,
    settings: GenerationSettings,
}

impl ModelGateway {
    pub fn new(provider: Arc<BoxLlmProvider>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Generate a reply to `message` given the conversation so far.
    ///
    /// `history` is not modified; the user's message is appended to a copy.
    /// Message length is assumed to have been checked by the caller.
    pub async fn generate(&self, history: &[Message], message: &str) -> Result<String, ChatError> {
        let request = self.build_request(history, message);

        let span = info_span!(
            "gen_ai.chat",
            gen_ai.system = self.provider.name(),
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
            history_len = history.len(),
        );

        match self.provider.complete(&request).instrument(span).await {
            Ok(response) => Ok(response.content),
            Err(err) => {
                let classified = classify_upstream_error(&err);
                error!(
                    provider = self.provider.name(),
                    error = %err,
                    classified = ?classified,
                    "Upstream generation failed"
                );
                Err(classified)
            }
        }
    }

    fn build_request(&self, history: &[Message], message: &str) -> CompletionRequest {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.extend_from_slice(history);
        messages.push(Message::user(message));

        CompletionRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: self.settings.max_output_tokens,
            temperature: Some(self.settings.temperature),
        }
    }
}

/// Map a provider failure onto the client-facing taxonomy.
///
/// Overload is recognised from the typed variant, or from an upstream
/// message that mentions "503" or "overloaded". Only text that came from the
/// provider is inspected; everything else is a generic upstream failure.
pub fn classify_upstream_error(err: &LlmError) -> ChatError {
    match err {
        LlmError::Overloaded(_) => ChatError::UpstreamOverloaded,
        LlmError::Provider { message } | LlmError::InvalidRequest(message)
            if mentions_overload(message) =>
        {
            ChatError::UpstreamOverloaded
        }
        _ => ChatError::UpstreamFailure,
    }
}

fn mentions_overload(message: &str) -> bool {
    message.contains("503") || message.to_lowercase().contains("overloaded")
}
