//! Chat request orchestration.
//!
//! `ChatHandler` runs one inbound request through a fixed sequence of
//! checks, each of which can end the request:
//!
//! 1. preflight / method
//! 2. provider credential present
//! 3. rate limit for the client key
//! 4. message present and within the length limit
//! 5. session resolution
//! 6. generation, then recording the exchange
//!
//! It is framework-agnostic: the HTTP layer translates requests into
//! [`InboundChat`] and [`ChatError`]s into responses.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_types::chat::{ChatReply, ChatRequest};
use parley_types::config::ServiceConfig;
use parley_types::error::ChatError;

use crate::chat::session::SessionStore;
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::gateway::{GenerationSettings, ModelGateway};
use crate::rate_limit::RateLimiter;

/// Client key used when the forwarded-address header is missing.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// HTTP method of an inbound request, as far as the handler cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestMethod {
    Options,
    Post,
    Other(String),
}

impl RequestMethod {
    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "OPTIONS" => RequestMethod::Options,
            "POST" => RequestMethod::Post,
            _ => RequestMethod::Other(method.to_string()),
        }
    }
}

/// One inbound request, already stripped of transport details.
#[derive(Debug, Clone)]
pub struct InboundChat {
    pub method: RequestMethod,
    /// Raw value of the forwarded-address header, if any.
    pub forwarded_for: Option<String>,
    /// Parsed body; `None` when the body was absent or not valid JSON.
    pub body: Option<ChatRequest>,
}

/// Successful outcome of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// OPTIONS preflight: success with no body.
    Preflight,
    Reply(ChatReply),
}

/// Process-wide state shared by every request.
///
/// Constructed once per process (or per test) and injected into the
/// handler; nothing here is global.
#[derive(Debug)]
pub struct ServiceState {
    pub rate_limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionStore>,
    /// `None` when no provider credential was configured.
    pub gateway: Option<ModelGateway>,
    shutdown: CancellationToken,
}

impl ServiceState {
    pub fn new(
        rate_limiter: RateLimiter,
        sessions: SessionStore,
        gateway: Option<ModelGateway>,
    ) -> Self {
        Self {
            rate_limiter: Arc::new(rate_limiter),
            sessions: Arc::new(sessions),
            gateway,
            shutdown: CancellationToken::new(),
        }
    }

    /// Wire the state from configuration and an optional provider.
    pub fn from_config(config: &ServiceConfig, provider: Option<BoxLlmProvider>) -> Self {
        let gateway = provider.map(|p| {
            ModelGateway::new(Arc::new(p), GenerationSettings::from(&config.model))
        });
        Self::new(
            RateLimiter::from_config(&config.rate_limit),
            SessionStore::from_config(&config.session, &config.persona),
            gateway,
        )
    }

    /// Start background maintenance (expired rate-limit window sweep).
    pub fn start_background_tasks(&self, config: &ServiceConfig) {
        Arc::clone(&self.rate_limiter)
            .spawn_sweeper(config.rate_limit.sweep_interval(), self.shutdown.child_token());
    }

    /// Stop background tasks and pending session expiry timers.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.sessions.shutdown();
    }
}

/// Per-request limits that are not owned by a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerLimits {
    pub max_message_chars: usize,
    pub default_session_id: String,
}

impl From<&ServiceConfig> for HandlerLimits {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            max_message_chars: config.chat.max_message_chars,
            default_session_id: config.session.default_session_id.clone(),
        }
    }
}

/// Orchestrates a single chat request against the shared [`ServiceState`].
#[derive(Debug, Clone)]
pub struct ChatHandler {
    state: Arc<ServiceState>,
    limits: HandlerLimits,
}

impl ChatHandler {
    pub fn new(state: Arc<ServiceState>, limits: HandlerLimits) -> Self {
        Self { state, limits }
    }

    pub fn state(&self) -> &Arc<ServiceState> {
        &self.state
    }

    pub fn limits(&self) -> &HandlerLimits {
        &self.limits
    }

    /// Run one request through every step. No step is retried.
    pub async fn handle(&self, request: InboundChat) -> Result<ChatOutcome, ChatError> {
        match request.method {
            RequestMethod::Options => return Ok(ChatOutcome::Preflight),
            RequestMethod::Post => {}
            RequestMethod::Other(ref method) => {
                debug!(method = %method, "Rejected non-POST chat request");
                return Err(ChatError::MethodNotAllowed);
            }
        }

        // Checked before rate limiting so a request that cannot succeed does
        // not use up a slot.
        let Some(gateway) = self.state.gateway.as_ref() else {
            warn!("Chat request rejected: provider credential not configured");
            return Err(ChatError::Misconfigured);
        };

        let client_key = client_key(request.forwarded_for.as_deref());
        let decision = self.state.rate_limiter.allow(&client_key);
        if !decision.permitted {
            return Err(ChatError::RateLimited {
                retry_after_secs: decision.retry_after_secs,
            });
        }

        let body = request.body.unwrap_or_default();
        let message = validate_message(body.message, self.limits.max_message_chars)?;
        let session_id = body
            .session_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.limits.default_session_id.clone());

        let session = self.state.sessions.get_or_create(&session_id);

        let reply = gateway.generate(&session.history, &message).await?;

        self.state
            .sessions
            .record_exchange(&session_id, session.generation, &message, &reply);

        info!(
            client_key = %client_key,
            session_id = %session_id,
            history_len = session.history.len() + 2,
            "Chat exchange completed"
        );

        Ok(ChatOutcome::Reply(ChatReply { response: reply }))
    }
}

/// Derive the rate-limit key from a forwarded-address header value.
///
/// Proxies append to `X-Forwarded-For`, so the first entry is the original
/// client. A missing or blank header maps to [`UNKNOWN_CLIENT`].
pub fn client_key(forwarded_for: Option<&str>) -> String {
    forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Require a non-empty message of at most `max_chars` characters.
fn validate_message(message: Option<String>, max_chars: usize) -> Result<String, ChatError> {
    let message = message
        .filter(|m| !m.is_empty())
        .ok_or_else(ChatError::message_required)?;

    if message.chars().count() > max_chars {
        return Err(ChatError::message_too_long(max_chars));
    }

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use parley_types::llm::{LlmError, MessageRole};

    use crate::llm::mock::{CallLog, ScriptedProvider};

    fn handler_with(provider: Option<ScriptedProvider>) -> ChatHandler {
        let config = ServiceConfig::default();
        let state = ServiceState::from_config(&config, provider.map(BoxLlmProvider::new));
        ChatHandler::new(Arc::new(state), HandlerLimits::from(&config))
    }

    fn scripted(replies: Vec<Result<String, LlmError>>) -> (ChatHandler, Arc<CallLog>) {
        let (provider, calls) = ScriptedProvider::new(replies);
        (handler_with(Some(provider)), calls)
    }

    fn post(ip: &str, message: Option<&str>, session_id: Option<&str>) -> InboundChat {
        InboundChat {
            method: RequestMethod::Post,
            forwarded_for: Some(ip.to_string()),
            body: Some(ChatRequest {
                message: message.map(str::to_string),
                session_id: session_id.map(str::to_string),
            }),
        }
    }

    fn reply(outcome: ChatOutcome) -> String {
        match outcome {
            ChatOutcome::Reply(r) => r.response,
            ChatOutcome::Preflight => panic!("expected a reply"),
        }
    }

    #[test]
    fn test_request_method_parse() {
        assert_eq!(RequestMethod::parse("OPTIONS"), RequestMethod::Options);
        assert_eq!(RequestMethod::parse("post"), RequestMethod::Post);
        assert_eq!(
            RequestMethod::parse("GET"),
            RequestMethod::Other("GET".to_string())
        );
    }

    #[test]
    fn test_client_key_derivation() {
        assert_eq!(client_key(Some("203.0.113.7")), "203.0.113.7");
        assert_eq!(client_key(Some("203.0.113.7, 10.0.0.1")), "203.0.113.7");
        assert_eq!(client_key(Some("  ")), UNKNOWN_CLIENT);
        assert_eq!(client_key(None), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_validate_message_boundaries() {
        assert_eq!(
            validate_message(None, 500),
            Err(ChatError::message_required())
        );
        assert_eq!(
            validate_message(Some(String::new()), 500),
            Err(ChatError::message_required())
        );
        assert!(validate_message(Some("a".repeat(500)), 500).is_ok());
        assert_eq!(
            validate_message(Some("a".repeat(501)), 500),
            Err(ChatError::message_too_long(500))
        );
    }

    #[test]
    fn test_validate_message_counts_characters_not_bytes() {
        // 500 two-byte characters.
        assert!(validate_message(Some("é".repeat(500)), 500).is_ok());
    }

    #[tokio::test]
    async fn test_options_is_preflight() {
        let (handler, calls) = scripted(vec![]);
        let outcome = handler
            .handle(InboundChat {
                method: RequestMethod::Options,
                forwarded_for: None,
                body: None,
            })
            .await
            .unwrap();
        assert_eq!(outcome, ChatOutcome::Preflight);
        assert_eq!(calls.count(), 0);
        assert_eq!(handler.state().rate_limiter.tracked_clients(), 0);
    }

    #[tokio::test]
    async fn test_other_methods_rejected() {
        let (handler, _calls) = scripted(vec![]);
        let mut request = post("1.1.1.1", Some("hi"), None);
        request.method = RequestMethod::Other("GET".to_string());
        assert_eq!(handler.handle(request).await, Err(ChatError::MethodNotAllowed));
    }

    #[tokio::test]
    async fn test_missing_credential_does_not_consume_rate_limit() {
        let handler = handler_with(None);
        for _ in 0..15 {
            let err = handler.handle(post("1.1.1.1", Some("hi"), None)).await;
            assert_eq!(err, Err(ChatError::Misconfigured));
        }
        assert_eq!(handler.state().rate_limiter.tracked_clients(), 0);
        assert!(handler.state().sessions.is_empty());
    }

    #[tokio::test]
    async fn test_successful_exchange_records_both_turns() {
        let (handler, calls) = scripted(vec![Ok("I build web apps.".to_string())]);

        let outcome = handler
            .handle(post("1.1.1.1", Some("What do you build?"), Some("s1")))
            .await
            .unwrap();
        assert_eq!(reply(outcome), "I build web apps.");

        let history = handler.state().sessions.get("s1").unwrap().history;
        assert_eq!(history.len(), 4);
        assert_eq!(history[2].role, MessageRole::User);
        assert_eq!(history[2].content, "What do you build?");
        assert_eq!(history[3].role, MessageRole::Model);
        assert_eq!(history[3].content, "I build web apps.");

        // The provider saw persona + greeting + the new message.
        assert_eq!(calls.last().unwrap().messages.len(), 3);
    }

    #[tokio::test]
    async fn test_history_accumulates_across_requests() {
        let (handler, calls) = scripted(vec![]);
        for i in 1..=3 {
            handler
                .handle(post("1.1.1.1", Some("again"), Some("s1")))
                .await
                .unwrap();
            let len = handler.state().sessions.get("s1").unwrap().history.len();
            assert_eq!(len, 2 + 2 * i);
        }
        // Third call replayed two prior exchanges plus the seed.
        assert_eq!(calls.last().unwrap().messages.len(), 7);
    }

    #[tokio::test]
    async fn test_missing_session_id_uses_default() {
        let (handler, _calls) = scripted(vec![]);
        handler.handle(post("1.1.1.1", Some("hi"), None)).await.unwrap();
        handler.handle(post("1.1.1.1", Some("hi"), Some(""))).await.unwrap();
        let session = handler.state().sessions.get("default").unwrap();
        assert_eq!(session.history.len(), 6);
    }

    #[tokio::test]
    async fn test_validation_runs_after_rate_limit() {
        let (handler, calls) = scripted(vec![]);
        let err = handler.handle(post("1.1.1.1", None, None)).await;
        assert_eq!(err, Err(ChatError::message_required()));
        assert_eq!(handler.state().rate_limiter.tracked_clients(), 1);
        assert_eq!(calls.count(), 0);
        assert!(handler.state().sessions.is_empty());
    }

    #[tokio::test]
    async fn test_absent_body_is_missing_message() {
        let (handler, _calls) = scripted(vec![]);
        let request = InboundChat {
            method: RequestMethod::Post,
            forwarded_for: None,
            body: None,
        };
        assert_eq!(
            handler.handle(request).await,
            Err(ChatError::message_required())
        );
    }

    #[tokio::test]
    async fn test_message_length_limit() {
        let (handler, _calls) = scripted(vec![]);
        let ok = "a".repeat(500);
        let too_long = "a".repeat(501);
        assert!(handler.handle(post("1.1.1.1", Some(ok.as_str()), None)).await.is_ok());
        assert_eq!(
            handler.handle(post("1.1.1.1", Some(too_long.as_str()), None)).await,
            Err(ChatError::message_too_long(500))
        );
    }

    #[tokio::test]
    async fn test_eleventh_request_rate_limited() {
        let (handler, calls) = scripted(vec![]);
        for _ in 0..10 {
            assert!(handler.handle(post("9.9.9.9", Some("hi"), None)).await.is_ok());
        }
        let err = handler.handle(post("9.9.9.9", Some("hi"), None)).await.unwrap_err();
        match err {
            ChatError::RateLimited { retry_after_secs } => {
                assert!(retry_after_secs > 3500 && retry_after_secs <= 3600);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert_eq!(calls.count(), 10);

        // Another client is unaffected.
        assert!(handler.handle(post("8.8.8.8", Some("hi"), None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_upstream_overload_leaves_history_untouched() {
        let (handler, _calls) = scripted(vec![Err(LlmError::Provider {
            message: "HTTP 503: The model is overloaded.".to_string(),
        })]);
        let err = handler.handle(post("1.1.1.1", Some("hi"), Some("s1"))).await;
        assert_eq!(err, Err(ChatError::UpstreamOverloaded));
        assert_eq!(handler.state().sessions.get("s1").unwrap().history.len(), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_generic() {
        let (handler, _calls) = scripted(vec![Err(LlmError::Deserialization(
            "unexpected field".to_string(),
        ))]);
        let err = handler.handle(post("1.1.1.1", Some("hi"), None)).await;
        assert_eq!(err, Err(ChatError::UpstreamFailure));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_is_recreated_fresh() {
        let (handler, _calls) = scripted(vec![]);
        handler.handle(post("1.1.1.1", Some("hi"), Some("s1"))).await.unwrap();
        assert_eq!(handler.state().sessions.get("s1").unwrap().history.len(), 4);

        tokio::time::sleep(Duration::from_secs(601)).await;
        assert!(handler.state().sessions.get("s1").is_none());

        handler.handle(post("1.1.1.1", Some("hi"), Some("s1"))).await.unwrap();
        assert_eq!(handler.state().sessions.get("s1").unwrap().history.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_outliving_session_is_not_recorded_in_successor() {
        let (provider, _calls) = ScriptedProvider::new(vec![]);
        let handler = handler_with(Some(provider.with_delay(Duration::from_secs(700))));

        let slow = {
            let handler = handler.clone();
            tokio::spawn(async move {
                handler.handle(post("1.1.1.1", Some("old question"), Some("s1"))).await
            })
        };

        // The first session expires at 600s while the provider is still working.
        tokio::time::sleep(Duration::from_secs(650)).await;
        assert!(handler.state().sessions.get("s1").is_none());
        let successor = handler.state().sessions.get_or_create("s1");
        assert_eq!(successor.history.len(), 2);

        let outcome = slow.await.unwrap().unwrap();
        assert_eq!(reply(outcome), "ok");

        let history = handler.state().sessions.get("s1").unwrap().history;
        assert_eq!(history, successor.history);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_admit_at_most_limit() {
        let (provider, calls) = ScriptedProvider::new(vec![]);
        let handler = handler_with(Some(provider.with_delay(Duration::from_millis(20))));

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let handler = handler.clone();
                tokio::spawn(async move { handler.handle(post("7.7.7.7", Some("hi"), None)).await })
            })
            .collect();

        let results = futures_util::future::join_all(handles).await;
        let admitted = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
        let limited = results
            .iter()
            .filter(|r| matches!(r, Ok(Err(ChatError::RateLimited { .. }))))
            .count();

        assert_eq!(admitted, 10);
        assert_eq!(limited, 10);
        assert_eq!(calls.count(), 10);
    }
}
