//! Infrastructure layer for Parley.
//!
//! Contains the concrete [`LlmProvider`](parley_core::llm::provider::LlmProvider)
//! implementation for Google Gemini and the loader that turns `parley.toml`
//! plus the process environment into a validated
//! [`ServiceConfig`](parley_types::config::ServiceConfig).

pub mod config;
pub mod llm;
