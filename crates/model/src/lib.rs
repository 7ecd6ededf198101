//! The contract between the orchestrator and a language model provider.
//!
//! A provider accepts an ordered list of messages, optionally bound to a
//! set of tools or to an output schema, and answers with one streamed
//! response made of text deltas and tool call requests.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
