//! Shared domain types for Parley.
//!
//! This crate contains the types exchanged between the chat core, the
//! provider implementations and the HTTP layer: chat wire bodies, LLM
//! request/response shapes, the error taxonomy and service configuration.
//!
//! Zero infrastructure dependencies -- only serde, serde_json and thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
