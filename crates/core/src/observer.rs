//! Classification and logging of graph updates.

mod format;

use tracing::{Level, Span};

pub use format::{format_data, format_text};

use crate::conversation::{Message, ToolCall, Update};

/// Receives every update of a run, in order.
///
/// Observation is one-way: an observer can't influence the run, and it is
/// called before the graph moves on to the next node. A panicking observer
/// loses the update it panicked on, and the run goes on.
pub trait Observer: Send + Sync {
    /// Handles one update.
    fn observe(&self, update: &Update);
}

/// What to log for one message.
///
/// Every message maps to exactly one action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogAction<'a> {
    /// A reply from the model.
    AiMessage {
        /// The reply text.
        content: &'a str,
        /// The requested tool calls.
        tool_calls: &'a [ToolCall],
    },
    /// The output of a tool.
    ToolResponse {
        /// Name of the tool.
        name: &'a str,
        /// What the tool returned.
        content: &'a str,
    },
    /// A prompt from the orchestrator.
    HumanMessage {
        /// The prompt text.
        content: &'a str,
    },
    /// A message that can't be logged normally.
    Unhandled {
        /// The kind of the message.
        kind: &'a str,
        /// The message as it was received.
        detail: String,
    },
}

/// A single log line produced by the observer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity of the line.
    pub level: Level,
    /// The module tag.
    pub module: &'static str,
    /// The title, e.g. `Tool Call Name`.
    pub title: &'static str,
    /// The formatted data.
    pub body: String,
}

impl LogRecord {
    fn new(
        level: Level,
        module: &'static str,
        title: &'static str,
        body: String,
    ) -> Self {
        Self {
            level,
            module,
            title,
            body,
        }
    }

    fn emit(&self) {
        let Self {
            level,
            module,
            title,
            body,
        } = self;
        match *level {
            Level::ERROR => error!(module, "{title}: {body}"),
            Level::WARN => warn!(module, "{title}: {body}"),
            Level::INFO => info!(module, "{title}: {body}"),
            Level::DEBUG => debug!(module, "{title}: {body}"),
            _ => trace!(module, "{title}: {body}"),
        }
    }
}

/// Maps a message to the action logging it.
pub fn classify(msg: &Message) -> LogAction<'_> {
    match msg {
        Message::Assistant {
            content,
            tool_calls,
        } => {
            if tool_calls.iter().any(|call| call.name.is_empty()) {
                return unhandled(msg);
            }
            LogAction::AiMessage {
                content,
                tool_calls,
            }
        }
        Message::ToolResult {
            call_name, content, ..
        } => {
            if call_name.is_empty() {
                return unhandled(msg);
            }
            LogAction::ToolResponse {
                name: call_name,
                content,
            }
        }
        Message::User { content } => LogAction::HumanMessage { content },
        Message::Other { kind, content } => LogAction::Unhandled {
            kind,
            detail: content.clone(),
        },
    }
}

fn unhandled(msg: &Message) -> LogAction<'_> {
    let detail =
        serde_json::to_string(msg).unwrap_or_else(|_| format!("{msg:?}"));
    LogAction::Unhandled {
        kind: msg.kind(),
        detail,
    }
}

impl LogAction<'_> {
    /// Expands the action into log records, in the order they are emitted.
    pub fn records(&self) -> Vec<LogRecord> {
        match self {
            LogAction::AiMessage {
                content,
                tool_calls,
            } => {
                let mut records = vec![LogRecord::new(
                    Level::INFO,
                    "AMSG",
                    "AI Message",
                    format_text((*content).to_owned()),
                )];
                for call in tool_calls.iter() {
                    records.push(LogRecord::new(
                        Level::INFO,
                        "AMSG",
                        "Tool Call Name",
                        format_text(call.name.clone()),
                    ));
                    records.push(LogRecord::new(
                        Level::INFO,
                        "AMSG",
                        "Tool Call Args",
                        format_data(&call.arguments),
                    ));
                }
                records
            }
            LogAction::ToolResponse { name, content } => vec![
                LogRecord::new(
                    Level::INFO,
                    "TMSG",
                    "Tool Response Name",
                    format_text((*name).to_owned()),
                ),
                LogRecord::new(
                    Level::INFO,
                    "TMSG",
                    "Tool Response Message",
                    format_text((*content).to_owned()),
                ),
            ],
            LogAction::HumanMessage { content } => vec![LogRecord::new(
                Level::DEBUG,
                "HMSG",
                "Human Message",
                format_text((*content).to_owned()),
            )],
            LogAction::Unhandled { kind, detail } => vec![LogRecord::new(
                Level::WARN,
                "NODE",
                "Unhandled Message",
                format_text(format!("{kind}: {detail}")),
            )],
        }
    }
}

/// The default observer, logging every message through `tracing`.
pub struct UpdateObserver {
    span: Span,
}

impl Default for UpdateObserver {
    fn default() -> Self {
        Self {
            span: info_span!("observer", logger = "LLMBAS"),
        }
    }
}

impl UpdateObserver {
    /// Returns the records logged for `update`.
    pub fn records(&self, update: &Update) -> Vec<LogRecord> {
        update
            .messages
            .iter()
            .flat_map(|msg| classify(msg).records())
            .collect()
    }
}

impl Observer for UpdateObserver {
    fn observe(&self, update: &Update) {
        let _enter = self.span.enter();
        trace!(
            node = %update.node,
            messages = update.messages.len(),
            "got an update"
        );
        for record in self.records(update) {
            record.emit();
        }
    }
}
