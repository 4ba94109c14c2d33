//! Parley HTTP layer and CLI.
//!
//! The binary (`parley`) is a thin wrapper over this library so the router
//! can be driven in-process by integration tests.

pub mod cli;
pub mod http;
pub mod state;
