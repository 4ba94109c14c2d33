//! Request-handling core for Parley.
//!
//! This crate defines the shared state every chat request goes through
//! (rate limiter, session store, model gateway) and the handler that
//! orchestrates them. It depends only on `parley-types` -- never on
//! `parley-infra`, an HTTP framework or a network client.

pub mod chat;
pub mod llm;
pub mod rate_limit;
