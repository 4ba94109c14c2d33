//! Chat endpoint.
//!
//! Registered for every method on the configured route (default
//! `/api/chat`) so that non-POST requests get the JSON 405 body rather
//! than axum's empty one. The request is reduced to an [`InboundChat`] and
//! handed to the core [`ChatHandler`](parley_core::chat::handler::ChatHandler).

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use parley_core::chat::handler::{ChatOutcome, InboundChat, RequestMethod};
use parley_types::chat::ChatRequest;

use crate::http::error::AppError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Any method on the chat route.
pub async fn chat(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = InboundChat {
        method: RequestMethod::parse(method.as_str()),
        forwarded_for: headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: ChatRequest::from_body(&body),
    };

    match state.chat.handle(request).await? {
        ChatOutcome::Preflight => Ok(StatusCode::OK.into_response()),
        ChatOutcome::Reply(reply) => Ok(Json(reply).into_response()),
    }
}
