//! Errors surfaced by a run.

use crate::conversation::ConversationState;
use crate::invoker::InvokeError;
use crate::tool;

/// A problem with how a run was put together.
///
/// These are detected before the model is called for the first time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The run has no tools to offer to the model.
    #[error("no tools are available")]
    NoTools,
    /// Both tools and an output schema were bound to the model.
    #[error("schema and tools should not be bound at the same time")]
    SchemaWithTools,
    /// The prompt template can't take the task description.
    #[error("prompt template has no `{{task}}` placeholder")]
    InvalidTemplate,
}

/// Why a run did not reach the end of the graph.
///
/// Every variant except [`RunError::Configuration`] carries the transcript
/// as it was when the run stopped.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The run could not be set up.
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    /// A requested tool call failed.
    #[error("tool `{tool}` failed: {source}")]
    ToolExecution {
        /// Name of the failing tool.
        tool: String,
        /// What went wrong.
        source: tool::Error,
        /// The transcript up to the failing call.
        state: ConversationState,
    },
    /// The model could not be reached or refused the request.
    #[error("model invocation failed: {source}")]
    Invocation {
        /// What went wrong.
        source: InvokeError,
        /// The transcript before the invocation.
        state: ConversationState,
    },
    /// The run was cancelled by the operator.
    #[error("run cancelled")]
    Cancelled {
        /// The transcript when the cancellation was observed.
        state: ConversationState,
    },
}

impl RunError {
    /// Returns the partial transcript, if the run got that far.
    pub fn state(&self) -> Option<&ConversationState> {
        match self {
            RunError::Configuration(_) => None,
            RunError::ToolExecution { state, .. }
            | RunError::Invocation { state, .. }
            | RunError::Cancelled { state } => Some(state),
        }
    }
}
