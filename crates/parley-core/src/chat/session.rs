//! In-memory conversation sessions with one-shot expiry.
//!
//! `SessionStore` exclusively owns every session. Callers get a cloned
//! snapshot from [`SessionStore::get_or_create`] so no `DashMap` guard is
//! ever held across the provider call; turns are appended afterwards under
//! a short write lock.
//!
//! Each session is removed a fixed time after it was created, whatever
//! happens in between. Expiry tasks are children of the store's
//! cancellation token and stop when the store shuts down.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use parley_types::config::{PersonaConfig, SessionConfig};
use parley_types::llm::{Message, MessageRole};

/// A server-held conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    pub id: String,
    /// Distinguishes this session from a later one reusing the same id.
    pub generation: Uuid,
    pub created_at: DateTime<Utc>,
    /// Ordered turns, starting with the persona instruction and greeting.
    pub history: Vec<Message>,
}

/// The two turns every new session starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSeed {
    pub persona: String,
    pub greeting: String,
}

impl From<&PersonaConfig> for SessionSeed {
    fn from(config: &PersonaConfig) -> Self {
        Self {
            persona: config.instruction.clone(),
            greeting: config.greeting.clone(),
        }
    }
}

impl SessionSeed {
    fn history(&self) -> Vec<Message> {
        vec![
            Message::user(self.persona.clone()),
            Message::model(self.greeting.clone()),
        ]
    }
}

/// Concurrent session map with scheduled expiry.
pub struct SessionStore {
    sessions: Arc<DashMap<String, ConversationSession>>,
    seed: SessionSeed,
    idle_ttl: Duration,
    shutdown: CancellationToken,
}

impl SessionStore {
    pub fn new(seed: SessionSeed, idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            seed,
            idle_ttl,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(session: &SessionConfig, persona: &PersonaConfig) -> Self {
        Self::new(SessionSeed::from(persona), session.idle_ttl())
    }

    /// Return a snapshot of the session for `session_id`, creating and
    /// seeding it if absent.
    ///
    /// Creation is atomic per id: concurrent first requests for the same id
    /// all observe the same session. Must be called from within a Tokio
    /// runtime because a new session schedules its expiry task.
    pub fn get_or_create(&self, session_id: &str) -> ConversationSession {
        let mut created = false;
        let snapshot = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                created = true;
                ConversationSession {
                    id: session_id.to_string(),
                    generation: Uuid::now_v7(),
                    created_at: Utc::now(),
                    history: self.seed.history(),
                }
            })
            .value()
            .clone();

        if created {
            debug!(session_id, ttl_secs = self.idle_ttl.as_secs(), "Session created");
            self.schedule_expiry(snapshot.id.clone(), snapshot.generation);
        }

        snapshot
    }

    /// Append one turn to the end of a session's history.
    ///
    /// `generation` is the one observed by the caller's
    /// [`get_or_create`](Self::get_or_create) snapshot. Returns `false` if
    /// that session no longer exists: it expired while the caller was
    /// waiting on the provider, possibly replaced by a fresh session under
    /// the same id.
    pub fn append(&self, session_id: &str, generation: Uuid, role: MessageRole, text: &str) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) if session.generation == generation => {
                session.history.push(Message {
                    role,
                    content: text.to_string(),
                });
                true
            }
            _ => false,
        }
    }

    /// Append a user turn and the model's reply under a single lock, so the
    /// pair stays adjacent even when requests for the same session overlap.
    ///
    /// Same generation check as [`append`](Self::append).
    pub fn record_exchange(
        &self,
        session_id: &str,
        generation: Uuid,
        user_text: &str,
        reply: &str,
    ) -> bool {
        match self.sessions.get_mut(session_id) {
            Some(mut session) if session.generation == generation => {
                session.history.push(Message::user(user_text));
                session.history.push(Message::model(reply));
                true
            }
            _ => {
                debug!(session_id, "Session expired before exchange was recorded");
                false
            }
        }
    }

    /// Snapshot of a session without creating it.
    pub fn get(&self, session_id: &str) -> Option<ConversationSession> {
        self.sessions.get(session_id).map(|r| r.value().clone())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stop all pending expiry tasks. Sessions already in the map stay.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn schedule_expiry(&self, session_id: String, generation: Uuid) {
        let sessions = Arc::clone(&self.sessions);
        let ttl = self.idle_ttl;
        let cancel = self.shutdown.child_token();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(ttl) => {
                    if expire(&sessions, &session_id, generation) {
                        debug!(session_id = %session_id, "Session expired");
                    }
                }
            }
        });
    }
}

/// Remove `session_id` if it is still the generation the timer was armed for.
/// Removing a missing or replaced session is a no-op.
fn expire(
    sessions: &DashMap<String, ConversationSession>,
    session_id: &str,
    generation: Uuid,
) -> bool {
    sessions
        .remove_if(session_id, |_, session| session.generation == generation)
        .is_some()
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.len())
            .field("idle_ttl", &self.idle_ttl)
            .finish()
    }
}
