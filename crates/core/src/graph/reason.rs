use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Node, NodeError, PromptTemplate};
use crate::conversation::{ConversationState, Message, ToolCall, Update};
use crate::invoker::ResilientInvoker;
use crate::model_client::ModelBinding;

/// Asks the model how to accomplish the task.
///
/// The node renders the task into the prompt template and sends it, bound to
/// the run's tools, through a [`ResilientInvoker`]. Both the prompt and the
/// reply are appended once the reply arrives.
pub struct ReasonNode {
    invoker: ResilientInvoker,
    binding: ModelBinding,
    template: PromptTemplate,
    cancel: CancellationToken,
}

impl ReasonNode {
    /// Creates the node.
    pub fn new(
        invoker: ResilientInvoker,
        binding: ModelBinding,
        template: PromptTemplate,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            invoker,
            binding,
            template,
            cancel,
        }
    }
}

#[async_trait]
impl Node for ReasonNode {
    fn name(&self) -> &str {
        "reason"
    }

    async fn run(
        &self,
        state: &mut ConversationState,
    ) -> Result<Update, NodeError> {
        let prompt = Message::user(self.template.render(state.task()));
        let mut messages = state.model_messages();
        messages.extend(prompt.to_model_message());
        let req = self.binding.request(messages);

        let resp = self.invoker.invoke(&req, &self.cancel).await?;
        trace!(finish_reason = ?resp.finish_reason, "model replied");
        let reply = Message::Assistant {
            content: resp.transcript,
            tool_calls: resp.tool_calls.into_iter().map(ToolCall::from).collect(),
        };

        state.push(prompt.clone());
        state.push(reply.clone());
        Ok(Update::new(self.name(), vec![prompt, reply]))
    }
}
