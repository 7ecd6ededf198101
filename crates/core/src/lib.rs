//! Orchestration core: a run drives one task through a fixed `reason` →
//! `act` graph, invoking the model resiliently and logging every update.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod conversation;
mod error;
pub mod graph;
pub mod invoker;
mod model_client;
pub mod observer;
mod runner;
#[cfg(test)]
mod test_util;
pub mod tool;

pub use conversation::{ConversationState, Message, ToolCall, Update};
pub use error::{ConfigError, RunError};
pub use invoker::{InvokeError, ResilientInvoker, RetryPolicy};
pub use model_client::{
    ModelBinding, ModelClient, ModelClientResponse, ModelError,
};
pub use observer::{Observer, UpdateObserver};
pub use runner::{Runner, RunnerBuilder};
pub use tool::{Tool, ToolResult, ToolSet};
