//! LLM provider abstractions for Parley.
//!
//! - `LlmProvider`: RPITIT trait for concrete provider implementations
//! - `BoxLlmProvider`: Object-safe wrapper for dynamic dispatch
//! - `ModelGateway`: fixed generation settings + upstream error classification

pub mod box_provider;
pub mod gateway;
pub mod provider;

#[cfg(test)]
pub(crate) mod mock;
