//! The execution graph of a run.
//!
//! A graph is an ordered list of nodes joined by unconditional edges. Running
//! it means running every node once, in order, over the same
//! [`ConversationState`], and then stopping. Each node reports what it
//! appended as an [`Update`].

mod act;
mod prompt;
mod reason;

use async_stream::stream;
use async_trait::async_trait;
use futures_util::Stream;

pub use act::ActNode;
pub use prompt::PromptTemplate;
pub use reason::ReasonNode;

use crate::conversation::{ConversationState, Update};
use crate::error::RunError;
use crate::invoker::InvokeError;
use crate::tool;

/// A unit of work in the graph.
#[async_trait]
pub trait Node: Send + Sync {
    /// Returns the name reported in updates.
    fn name(&self) -> &str;

    /// Runs the node, appending its messages to `state`.
    ///
    /// On failure, the messages appended so far stay in `state`.
    async fn run(
        &self,
        state: &mut ConversationState,
    ) -> Result<Update, NodeError>;
}

/// Why a node could not complete.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// The model invocation failed.
    #[error(transparent)]
    Invocation(#[from] InvokeError),
    /// A tool call failed.
    #[error("tool `{tool}` failed: {source}")]
    Tool {
        /// Name of the failing tool.
        tool: String,
        /// What went wrong.
        source: tool::Error,
    },
    /// The node observed a cancellation.
    #[error("cancelled")]
    Cancelled,
}

impl NodeError {
    pub(crate) fn into_run_error(self, state: ConversationState) -> RunError {
        match self {
            NodeError::Invocation(InvokeError::Cancelled)
            | NodeError::Cancelled => RunError::Cancelled { state },
            NodeError::Invocation(source) => {
                RunError::Invocation { source, state }
            }
            NodeError::Tool { tool, source } => RunError::ToolExecution {
                tool,
                source,
                state,
            },
        }
    }
}

/// A linear pipeline of nodes.
#[derive(Default)]
pub struct ExecutionGraph {
    nodes: Vec<Box<dyn Node>>,
}

impl ExecutionGraph {
    /// Appends a node, adding an edge from the previous last node.
    #[inline]
    pub fn with_node<N: Node + 'static>(mut self, node: N) -> Self {
        self.nodes.push(Box::new(node));
        self
    }

    /// Returns the node names in execution order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.name())
    }

    /// Runs the graph over `state`, yielding one update per node.
    ///
    /// A node only runs when the stream is polled, so the consumer is done
    /// with an update before the next node starts. The stream ends after
    /// the last node or after the first error. A failing node that already
    /// appended messages yields them as an update right before its error.
    pub fn stream<'a>(
        &'a self,
        state: &'a mut ConversationState,
    ) -> impl Stream<Item = Result<Update, NodeError>> + Send + 'a {
        stream! {
            for node in &self.nodes {
                debug!(module = "NODE", node = node.name(), "enter");
                let before = state.messages().len();
                match node.run(state).await {
                    Ok(update) => yield Ok(update),
                    Err(err) => {
                        warn!(
                            module = "NODE",
                            node = node.name(),
                            error = %err,
                            "node failed"
                        );
                        // Report what the node appended before failing.
                        let appended = state.messages()[before..].to_vec();
                        if !appended.is_empty() {
                            yield Ok(Update::new(node.name(), appended));
                        }
                        yield Err(err);
                        return;
                    }
                }
            }
            debug!(module = "NODE", "reached terminal");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::StreamExt;

    use super::*;
    use crate::conversation::Message;

    struct Append {
        name: &'static str,
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Node for Append {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(
            &self,
            state: &mut ConversationState,
        ) -> Result<Update, NodeError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let msg = Message::user(self.name);
            state.push(msg.clone());
            Ok(Update::new(self.name, vec![msg]))
        }
    }

    struct Fail;

    #[async_trait]
    impl Node for Fail {
        fn name(&self) -> &str {
            "fail"
        }

        async fn run(
            &self,
            _state: &mut ConversationState,
        ) -> Result<Update, NodeError> {
            Err(NodeError::Cancelled)
        }
    }

    #[tokio::test]
    async fn test_nodes_run_on_demand() {
        let runs = Arc::new(AtomicUsize::new(0));
        let graph = ExecutionGraph::default()
            .with_node(Append {
                name: "first",
                runs: Arc::clone(&runs),
            })
            .with_node(Append {
                name: "second",
                runs: Arc::clone(&runs),
            });
        assert_eq!(graph.node_names().collect::<Vec<_>>(), ["first", "second"]);

        let mut state = ConversationState::new("t");
        {
            let mut updates = pin!(graph.stream(&mut state));
            assert_eq!(runs.load(Ordering::SeqCst), 0);

            let update = updates.next().await.unwrap().unwrap();
            assert_eq!(update.node, "first");
            assert_eq!(runs.load(Ordering::SeqCst), 1);

            let update = updates.next().await.unwrap().unwrap();
            assert_eq!(update.node, "second");
            assert!(updates.next().await.is_none());
        }
        assert_eq!(state.messages().len(), 2);
    }

    struct AppendThenFail;

    #[async_trait]
    impl Node for AppendThenFail {
        fn name(&self) -> &str {
            "act"
        }

        async fn run(
            &self,
            state: &mut ConversationState,
        ) -> Result<Update, NodeError> {
            state.push(Message::user("done"));
            Err(NodeError::Cancelled)
        }
    }

    #[tokio::test]
    async fn test_partial_update_before_error() {
        let graph = ExecutionGraph::default().with_node(AppendThenFail);
        let mut state = ConversationState::new("t");
        state.push(Message::user("earlier"));

        let mut updates = pin!(graph.stream(&mut state));
        let update = updates.next().await.unwrap().unwrap();
        assert_eq!(update, Update::new("act", vec![Message::user("done")]));
        assert!(matches!(
            updates.next().await,
            Some(Err(NodeError::Cancelled))
        ));
        assert!(updates.next().await.is_none());
    }

    #[tokio::test]
    async fn test_stops_at_first_error() {
        let runs = Arc::new(AtomicUsize::new(0));
        let graph = ExecutionGraph::default().with_node(Fail).with_node(Append {
            name: "after",
            runs: Arc::clone(&runs),
        });

        let mut state = ConversationState::new("t");
        let mut updates = pin!(graph.stream(&mut state));
        assert!(updates.next().await.unwrap().is_err());
        assert!(updates.next().await.is_none());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
