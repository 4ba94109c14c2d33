//! Fixed-window rate limiting per client key.
//!
//! Each client gets a window that opens on its first request and lasts
//! `window`. Up to `max_requests` requests are admitted inside a window;
//! the first request after the window has closed opens a fresh one.
//!
//! The read-check-increment runs under the `DashMap` shard lock for the
//! key, so concurrent requests at the boundary cannot both take the last
//! slot.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use parley_types::config::RateLimitConfig;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub permitted: bool,
    /// Whole seconds (rounded up) until the client's window closes.
    /// Zero when the request was permitted.
    pub retry_after_secs: u64,
}

impl RateDecision {
    fn permit() -> Self {
        Self {
            permitted: true,
            retry_after_secs: 0,
        }
    }

    fn reject(retry_after_secs: u64) -> Self {
        Self {
            permitted: false,
            retry_after_secs,
        }
    }
}

/// Request counter for one client.
#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    count: u32,
    reset_at: Instant,
}

/// Process-local fixed-window rate limiter.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: DashMap<String, ClientWindow>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Record a request from `client_key` and decide whether to admit it.
    pub fn allow(&self, client_key: &str) -> RateDecision {
        self.allow_at(client_key, Instant::now())
    }

    /// [`allow`](Self::allow) with an explicit clock reading.
    pub fn allow_at(&self, client_key: &str, now: Instant) -> RateDecision {
        match self.windows.entry(client_key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(ClientWindow {
                    count: 1,
                    reset_at: now + self.window,
                });
                RateDecision::permit()
            }
            Entry::Occupied(mut occupied) => {
                let window = occupied.get_mut();

                if now >= window.reset_at {
                    window.count = 1;
                    window.reset_at = now + self.window;
                    debug!(client_key, "Rate limit window reset");
                    return RateDecision::permit();
                }

                if window.count < self.max_requests {
                    window.count += 1;
                    return RateDecision::permit();
                }

                let retry_after_secs = ceil_secs(window.reset_at.saturating_duration_since(now));
                warn!(
                    client_key,
                    count = window.count,
                    retry_after_secs,
                    "Rate limit exceeded"
                );
                RateDecision::reject(retry_after_secs)
            }
        }
    }

    /// Drop windows that have already closed.
    ///
    /// A closed window behaves exactly like a missing one on the next
    /// request, so this only reclaims memory. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, window| now < window.reset_at);
        before.saturating_sub(self.windows.len())
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until
    /// `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.sweep_expired();
                        if removed > 0 {
                            debug!(removed, remaining = self.tracked_clients(), "Swept expired rate-limit windows");
                        }
                    }
                }
            }
        })
    }

    /// Number of clients currently holding a window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("window", &self.window)
            .field("tracked_clients", &self.windows.len())
            .finish()
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
