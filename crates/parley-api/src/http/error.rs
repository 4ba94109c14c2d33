//! Application error type mapping chat failures to HTTP responses.
//!
//! Every failure is answered with `{"error": "..."}`; rate limiting adds a
//! `retryAfter` hint and a `Retry-After` header. Upstream detail never
//! appears in a body -- it was already logged by the gateway.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use parley_types::chat::ErrorBody;
use parley_types::error::ChatError;

pub const METHOD_NOT_ALLOWED: &str = "Method not allowed";
pub const API_KEY_NOT_CONFIGURED: &str = "API key not configured";
pub const TOO_MANY_REQUESTS: &str = "Too many requests. Please try again later.";
pub const UPSTREAM_OVERLOADED: &str = "Gemini is currently overloaded. Please try again in a moment!";
pub const UPSTREAM_FAILURE: &str = "Failed to get response. Please try again.";

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub struct AppError(pub ChatError);

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError(e)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ChatError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ChatError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ChatError::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ChatError::UpstreamOverloaded => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::UpstreamFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match &self.0 {
            ChatError::InvalidInput(msg) => ErrorBody::new(msg.clone()),
            ChatError::MethodNotAllowed => ErrorBody::new(METHOD_NOT_ALLOWED),
            ChatError::Misconfigured => ErrorBody::new(API_KEY_NOT_CONFIGURED),
            ChatError::RateLimited { retry_after_secs } => {
                ErrorBody::new(TOO_MANY_REQUESTS).with_retry_after(retry_hint(*retry_after_secs))
            }
            ChatError::UpstreamOverloaded => ErrorBody::new(UPSTREAM_OVERLOADED),
            ChatError::UpstreamFailure => ErrorBody::new(UPSTREAM_FAILURE),
        }
    }
}

/// Human-readable wait: whole minutes, rounded up.
pub fn retry_hint(retry_after_secs: u64) -> String {
    format!("{} minutes", retry_after_secs.div_ceil(60))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();

        if let ChatError::RateLimited { retry_after_secs } = self.0 {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}
