//! Service configuration types for Parley.
//!
//! `ServiceConfig` represents the optional `parley.toml` that controls the
//! listener, rate limiting, session lifetime, generation settings and the
//! persona seeded into every new conversation. Every field has a default,
//! so an empty file (or no file at all) yields a working configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration for the proxy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub persona: PersonaConfig,
}

/// Path of the liveness endpoint; the chat route may not shadow it.
pub const HEALTH_ROUTE: &str = "/health";

impl ServiceConfig {
    /// Reject values that would make the service misbehave rather than fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.route.starts_with('/') {
            return Err(invalid("server.route", "must start with '/'"));
        }
        if self.server.route == HEALTH_ROUTE {
            return Err(invalid("server.route", "must not collide with the health route"));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(invalid("rate_limit.max_requests", "must be at least 1"));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(invalid("rate_limit.window_secs", "must be greater than 0"));
        }
        if self.rate_limit.sweep_interval_secs == 0 {
            return Err(invalid("rate_limit.sweep_interval_secs", "must be greater than 0"));
        }
        if self.session.idle_ttl_secs == 0 {
            return Err(invalid("session.idle_ttl_secs", "must be greater than 0"));
        }
        if self.session.default_session_id.is_empty() {
            return Err(invalid("session.default_session_id", "must not be empty"));
        }
        if self.chat.max_message_chars == 0 {
            return Err(invalid("chat.max_message_chars", "must be greater than 0"));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(invalid("model.temperature", "must be within 0.0..=2.0"));
        }
        if self.model.name.trim().is_empty() {
            return Err(invalid("model.name", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path of the single chat route.
    #[serde(default = "default_route")]
    pub route: String,
    /// Origins echoed back in CORS responses. Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_route() -> String {
    "/api/chat".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            route: default_route(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Fixed-window rate limiting per client address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// How often windows that have already expired are dropped from memory.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_max_requests() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Conversation session lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions are removed this long after creation, whatever their activity.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
    /// Session id used when the client does not send one.
    #[serde(default = "default_session_id")]
    pub default_session_id: String,
}

fn default_idle_ttl_secs() -> u64 {
    600
}

fn default_session_id() -> String {
    "default".to_string()
}

impl SessionConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl_secs(),
            default_session_id: default_session_id(),
        }
    }
}

/// Inbound message limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

fn default_max_message_chars() -> usize {
    500
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_chars: default_max_message_chars(),
        }
    }
}

/// Generation settings applied to every provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_model_base_url")]
    pub base_url: String,
    /// Deadline for a single provider call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model_name() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_max_output_tokens() -> u32 {
    200
}

fn default_temperature() -> f64 {
    0.7
}

fn default_model_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl ModelConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            max_output_tokens: default_max_output_tokens(),
            temperature: default_temperature(),
            base_url: default_model_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// The two turns every new conversation starts with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_instruction")]
    pub instruction: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

fn default_instruction() -> String {
    "You are an AI assistant embedded in a developer's portfolio website. \
     Be concise, friendly and professional. Answer questions about the \
     developer's skills, projects and experience. Keep responses short \
     unless the visitor explicitly asks for details."
        .to_string()
}

fn default_greeting() -> String {
    "Hello! I can tell you about the skills and projects on this portfolio. \
     What would you like to know?"
        .to_string()
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            instruction: default_instruction(),
            greeting: default_greeting(),
        }
    }
}
