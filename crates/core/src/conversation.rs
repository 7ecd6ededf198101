//! Conversation-related types.

use llmbas_model::{ModelMessage, ToolCallRequest, ToolCallResult};
use serde::Serialize;
use serde_json::Value;

/// A tool invocation requested by the assistant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolCall {
    /// The identifier assigned by the model.
    pub id: String,
    /// Name of the requested tool.
    pub name: String,
    /// Structured arguments for the tool.
    pub arguments: Value,
}

impl From<ToolCallRequest> for ToolCall {
    #[inline]
    fn from(req: ToolCallRequest) -> Self {
        Self {
            id: req.id,
            name: req.name,
            arguments: req.arguments,
        }
    }
}

/// A message in the transcript.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// A prompt contributed by the orchestrator.
    User {
        /// The prompt text.
        content: String,
    },
    /// A reply from the model.
    Assistant {
        /// The text part of the reply, may be empty.
        content: String,
        /// Requested tool calls, in the order the model issued them.
        tool_calls: Vec<ToolCall>,
    },
    /// Output of one tool call.
    ToolResult {
        /// Identifier of the originating call.
        call_id: String,
        /// Name of the tool that was called.
        call_name: String,
        /// What the tool returned.
        content: String,
    },
    /// A message of a kind the orchestrator does not know how to handle.
    ///
    /// It is kept in the transcript but never sent back to the model.
    Other {
        /// A short name of the message kind.
        kind: String,
        /// Raw content of the message.
        content: String,
    },
}

impl Message {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Returns the name of this message's kind.
    pub fn kind(&self) -> &str {
        match self {
            Message::User { .. } => "user",
            Message::Assistant { .. } => "assistant",
            Message::ToolResult { .. } => "tool_result",
            Message::Other { kind, .. } => kind,
        }
    }

    pub(crate) fn to_model_message(&self) -> Option<ModelMessage> {
        Some(match self {
            Message::User { content } => ModelMessage::User(content.clone()),
            Message::Assistant {
                content,
                tool_calls,
            } => ModelMessage::Assistant {
                content: content.clone(),
                tool_calls: tool_calls
                    .iter()
                    .map(|call| ToolCallRequest {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    })
                    .collect(),
            },
            Message::ToolResult {
                call_id,
                call_name,
                content,
            } => ModelMessage::Tool(ToolCallResult {
                id: call_id.clone(),
                name: call_name.clone(),
                content: content.clone(),
            }),
            Message::Other { .. } => return None,
        })
    }
}

/// The data threaded through a run: the transcript and the task.
///
/// Messages can only be appended, never removed or reordered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationState {
    messages: Vec<Message>,
    task: String,
}

impl ConversationState {
    /// Creates an empty conversation for the given task.
    #[inline]
    pub fn new<S: Into<String>>(task: S) -> Self {
        Self {
            messages: vec![],
            task: task.into(),
        }
    }

    /// Returns the task description of this run.
    #[inline]
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Returns the transcript so far.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the tool calls of the most recent assistant message.
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        self.messages
            .iter()
            .rev()
            .find_map(|msg| match msg {
                Message::Assistant { tool_calls, .. } => {
                    Some(tool_calls.as_slice())
                }
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Consumes the state and returns the transcript.
    #[inline]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    #[inline]
    pub(crate) fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub(crate) fn model_messages(&self) -> Vec<ModelMessage> {
        self.messages
            .iter()
            .filter_map(Message::to_model_message)
            .collect()
    }
}

/// The messages appended by one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    /// Name of the node that produced this update.
    pub node: String,
    /// The appended messages, in order.
    pub messages: Vec<Message>,
}

impl Update {
    /// Creates an update for the given node.
    #[inline]
    pub fn new<S: Into<String>>(node: S, messages: Vec<Message>) -> Self {
        Self {
            node: node.into(),
            messages,
        }
    }
}
