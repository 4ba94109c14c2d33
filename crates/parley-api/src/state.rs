//! Application state wiring the chat core to its concrete provider.
//!
//! AppState is cheap to clone: the config and the handler's shared state
//! sit behind `Arc`s.

use std::sync::Arc;

use secrecy::SecretString;

use parley_core::chat::handler::{ChatHandler, HandlerLimits, ServiceState};
use parley_core::llm::box_provider::BoxLlmProvider;
use parley_infra::llm::create_provider;
use parley_types::config::ServiceConfig;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub chat: ChatHandler,
}

impl AppState {
    /// Build the state for a running server.
    ///
    /// Without an API key the state is still built; every chat request is
    /// then answered with the misconfiguration error.
    pub fn init(config: ServiceConfig, api_key: Option<SecretString>) -> anyhow::Result<Self> {
        let provider = match api_key {
            Some(key) => Some(create_provider(&config.model, key)?),
            None => {
                tracing::warn!("GEMINI_API_KEY is not set; chat requests will fail until it is configured");
                None
            }
        };
        Ok(Self::from_parts(config, provider))
    }

    /// Build the state around an already-constructed provider (or none).
    pub fn from_parts(config: ServiceConfig, provider: Option<BoxLlmProvider>) -> Self {
        let service = Arc::new(ServiceState::from_config(&config, provider));
        let chat = ChatHandler::new(service, HandlerLimits::from(&config));
        Self {
            config: Arc::new(config),
            chat,
        }
    }

    /// Start the periodic rate-limit sweep.
    pub fn start_background_tasks(&self) {
        self.chat.state().start_background_tasks(&self.config);
    }

    pub fn has_provider(&self) -> bool {
        self.chat.state().gateway.is_some()
    }

    /// Cancel background tasks and pending session expiry timers.
    pub fn shutdown(&self) {
        self.chat.state().shutdown();
    }
}
