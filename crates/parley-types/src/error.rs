use thiserror::Error;

/// Terminal outcome of a chat request that did not produce a reply.
///
/// None of these are retried by the service itself. `RateLimited` and
/// `UpstreamOverloaded` are meant to be retried by the caller;
/// `Misconfigured` needs an operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("provider credential not configured")]
    Misconfigured,

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("upstream provider overloaded")]
    UpstreamOverloaded,

    #[error("upstream provider failure")]
    UpstreamFailure,
}

impl ChatError {
    /// Message text shown to the client for a missing message field.
    pub const MESSAGE_REQUIRED: &'static str = "Message is required";

    /// Build the "message too long" validation error for a character limit.
    pub fn message_too_long(max_chars: usize) -> Self {
        ChatError::InvalidInput(format!("Message too long (max {max_chars} characters)"))
    }

    pub fn message_required() -> Self {
        ChatError::InvalidInput(Self::MESSAGE_REQUIRED.to_string())
    }
}

/// Errors raised while loading service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}
