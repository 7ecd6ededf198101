//! Driving a run end to end.

mod builder;

use std::panic::{self, AssertUnwindSafe};
use std::pin::pin;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

pub use builder::RunnerBuilder;

use crate::conversation::ConversationState;
use crate::error::RunError;
use crate::graph::{ExecutionGraph, NodeError};
use crate::observer::Observer;

/// Runs tasks through a `reason` → `act` graph and reports every update to
/// an observer.
///
/// Use [`RunnerBuilder`] to create one.
pub struct Runner {
    graph: ExecutionGraph,
    observer: Box<dyn Observer>,
    cancel: CancellationToken,
    span: Span,
}

impl Runner {
    /// Returns the token that cancels runs of this runner.
    ///
    /// Once cancelled, the in-flight run and any later run stop with
    /// [`RunError::Cancelled`].
    #[inline]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs `task` to the end of the graph and returns the transcript.
    pub async fn run<S: Into<String>>(
        &self,
        task: S,
    ) -> Result<ConversationState, RunError> {
        let mut state = ConversationState::new(task);
        self.span.in_scope(|| {
            info!(module = "RUN", task = state.task(), "run started");
        });

        let outcome = self
            .drive(&mut state)
            .instrument(self.span.clone())
            .await;

        self.span.in_scope(|| match outcome {
            Ok(()) => {
                info!(
                    module = "RUN",
                    messages = state.messages().len(),
                    "run finished"
                );
                Ok(state)
            }
            Err(err) => {
                let err = err.into_run_error(state);
                error!(module = "RUN", error = %err, "run failed");
                Err(err)
            }
        })
    }

    async fn drive(
        &self,
        state: &mut ConversationState,
    ) -> Result<(), NodeError> {
        let mut updates = pin!(self.graph.stream(state));
        while let Some(update) = updates.next().await {
            let update = update?;
            let observed = panic::catch_unwind(AssertUnwindSafe(|| {
                self.observer.observe(&update)
            }));
            if observed.is_err() {
                warn!(
                    module = "NODE",
                    node = %update.node,
                    "observer failed, update skipped"
                );
            }
        }
        Ok(())
    }
}
