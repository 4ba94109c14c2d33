//! HTTP layer for Parley.
//!
//! Axum-based: one chat route, a health check, CORS and request tracing.

pub mod error;
pub mod handlers;
pub mod router;
