use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Node, NodeError};
use crate::conversation::{ConversationState, Message, Update};
use crate::tool::ToolSet;

/// Executes the tool calls of the latest assistant message.
///
/// Calls run one after another in the order the model issued them, and each
/// result is appended as soon as it is available. The first failing call
/// stops the node.
pub struct ActNode {
    tools: ToolSet,
    tool_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl ActNode {
    /// Creates the node.
    pub fn new(
        tools: ToolSet,
        tool_timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tools,
            tool_timeout,
            cancel,
        }
    }
}

#[async_trait]
impl Node for ActNode {
    fn name(&self) -> &str {
        "act"
    }

    async fn run(
        &self,
        state: &mut ConversationState,
    ) -> Result<Update, NodeError> {
        let calls = state.pending_tool_calls().to_vec();
        if calls.is_empty() {
            debug!(module = "NODE", "no tool calls requested");
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            debug!(module = "NODE", tool = %call.name, id = %call.id, "call tool");
            let output = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(NodeError::Cancelled),
                output = self.tools.call(&call, self.tool_timeout) => output,
            };
            let content = output.map_err(|source| NodeError::Tool {
                tool: call.name.clone(),
                source,
            })?;

            let result = Message::ToolResult {
                call_id: call.id,
                call_name: call.name,
                content,
            };
            state.push(result.clone());
            results.push(result);
        }
        Ok(Update::new(self.name(), results))
    }
}
