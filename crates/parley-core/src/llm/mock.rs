//! Scripted provider double shared by the core's unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError, StopReason, Usage};

use super::provider::LlmProvider;

/// Requests seen by a [`ScriptedProvider`].
#[derive(Default)]
pub(crate) struct CallLog {
    requests: Mutex<Vec<CompletionRequest>>,
}

impl CallLog {
    pub(crate) fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn last(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

/// Returns scripted outcomes in order, then `"ok"` once the script runs out.
pub(crate) struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    log: Arc<CallLog>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub(crate) fn new(script: Vec<Result<String, LlmError>>) -> (Self, Arc<CallLog>) {
        let log = Arc::new(CallLog::default());
        let provider = Self {
            script: Mutex::new(script.into()),
            log: Arc::clone(&log),
            delay: None,
        };
        (provider, log)
    }

    pub(crate) fn replying<I>(replies: I) -> (Self, Arc<CallLog>)
    where
        I: IntoIterator<Item = &'static str>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub(crate) fn failing(err: LlmError) -> (Self, Arc<CallLog>) {
        Self::new(vec![Err(err)])
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.log.requests.lock().unwrap().push(request.clone());
        let outcome = {
            let mut script = self.script.lock().unwrap();
            script.pop_front().unwrap_or_else(|| Ok("ok".to_string()))
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        outcome.map(|content| CompletionResponse {
            content,
            model: request.model.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        })
    }
}
