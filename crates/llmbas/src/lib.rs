//! Drives one task description through a model that picks and calls tools
//! exposed by MCP servers.
//!
//! The crate includes the `llmbas` CLI. It can also be used as a library to
//! connect to MCP servers and hand their tools to a
//! [`RunnerBuilder`](llmbas_core::RunnerBuilder).

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod mcp;

/// Re-exports of [`llmbas_core`] crate.
pub mod core {
    pub use llmbas_core::*;
}
