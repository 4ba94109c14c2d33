//! LLM provider implementations.
//!
//! Contains the concrete implementation of the [`LlmProvider`] trait
//! defined in `parley-core` for Google Gemini, and a factory
//! ([`create_provider`]) that builds it from configuration.
//!
//! [`LlmProvider`]: parley_core::llm::provider::LlmProvider

pub mod gemini;

use secrecy::{ExposeSecret, SecretString};

use parley_core::llm::box_provider::BoxLlmProvider;
use parley_types::config::ModelConfig;
use parley_types::llm::LlmError;

use self::gemini::GeminiProvider;

/// Create a [`BoxLlmProvider`] for the configured model.
///
/// # Errors
///
/// Returns [`LlmError::AuthenticationFailed`] for a blank key, or a
/// provider error if the HTTP client cannot be built.
pub fn create_provider(config: &ModelConfig, api_key: SecretString) -> Result<BoxLlmProvider, LlmError> {
    if api_key.expose_secret().trim().is_empty() {
        return Err(LlmError::AuthenticationFailed);
    }
    let provider = GeminiProvider::new(api_key, config)?;
    tracing::debug!(model = %config.name, base_url = %config.base_url, "Created Gemini provider");
    Ok(BoxLlmProvider::new(provider))
}
