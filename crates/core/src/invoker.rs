//! Resilient invocation of the model.

mod retry;

use backoff::backoff::Backoff;
use llmbas_model::ModelRequest;
use tokio::runtime::Handle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use crate::model_client::{ModelClient, ModelClientResponse, ModelError};
pub use retry::RetryPolicy;

/// Why an invocation returned without a response.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    /// The provider refused the request in a way retrying can't fix.
    #[error("request rejected: {0}")]
    Rejected(#[source] ModelError),
    /// Every allowed attempt failed.
    #[error("giving up after {attempts} attempts: {source}")]
    Exhausted {
        /// How many attempts were made.
        attempts: u32,
        /// The failure of the last attempt.
        source: ModelError,
    },
    /// The operator cancelled the invocation.
    #[error("invocation cancelled")]
    Cancelled,
    /// The runtime for a blocking invocation could not be created.
    #[error("failed to start a runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// A blocking invocation was made from within an asynchronous runtime.
    #[error("blocking invocation inside an async runtime")]
    InsideRuntime,
}

/// Calls the model until a response arrives, masking transient failures.
///
/// Each call is one logical request: the same request is sent again after a
/// transient failure, following the [`RetryPolicy`]. Cancellation is
/// observed both while waiting for the model and while backing off, and
/// always wins over a pending retry.
pub struct ResilientInvoker {
    client: ModelClient,
    policy: RetryPolicy,
    span: Span,
}

impl ResilientInvoker {
    /// Creates an invoker over the given client.
    pub fn new(client: ModelClient, policy: RetryPolicy) -> Self {
        let span = info_span!(
            "invoker",
            logger = "LLMBAS.LLM",
            model = client.label()
        );
        Self {
            client,
            policy,
            span,
        }
    }

    /// Returns the retry policy in use.
    #[inline]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Invokes the model and returns its response verbatim.
    ///
    /// The caller must handle [`InvokeError::Cancelled`], it is returned as
    /// soon as `cancel` is triggered and no further attempt is made.
    pub async fn invoke(
        &self,
        req: &ModelRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelClientResponse, InvokeError> {
        self.invoke_tagged("AINVOKE", req, cancel)
            .instrument(self.span.clone())
            .await
    }

    /// Same as [`invoke`](Self::invoke), but blocks the current thread.
    ///
    /// Fails with [`InvokeError::InsideRuntime`] if called from within an
    /// asynchronous runtime.
    pub fn invoke_blocking(
        &self,
        req: &ModelRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelClientResponse, InvokeError> {
        if Handle::try_current().is_ok() {
            error!(module = "INVOKE", "called from within a runtime");
            return Err(InvokeError::InsideRuntime);
        }
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(InvokeError::Runtime)?;
        rt.block_on(
            self.invoke_tagged("INVOKE", req, cancel)
                .instrument(self.span.clone()),
        )
    }

    async fn invoke_tagged(
        &self,
        module: &'static str,
        req: &ModelRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelClientResponse, InvokeError> {
        let mut backoff = self.policy.backoff();
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(module, attempt, "invoke");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = self.attempt(req) => Some(outcome),
            };
            let err = match outcome {
                None => {
                    warn!(module, attempt, "cancelled while waiting");
                    return Err(InvokeError::Cancelled);
                }
                Some(Ok(resp)) => {
                    info!(module, attempt, "invoke succeeded");
                    return Ok(resp);
                }
                Some(Err(err)) => err,
            };

            if !err.is_transient() {
                error!(module, attempt, error = %err, "request rejected");
                return Err(InvokeError::Rejected(err));
            }
            if !self.policy.allows(attempt + 1) {
                error!(module, attempt, error = %err, "giving up");
                return Err(InvokeError::Exhausted {
                    attempts: attempt,
                    source: err,
                });
            }

            let delay = backoff
                .next_backoff()
                .unwrap_or(self.policy.max_interval);
            warn!(
                module,
                attempt,
                error = %err,
                retry_in = ?delay,
                "invoke failed, invoking again"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(module, attempt, "cancelled while backing off");
                    return Err(InvokeError::Cancelled);
                }
                _ = sleep(delay) => {}
            }
        }
    }

    async fn attempt(
        &self,
        req: &ModelRequest,
    ) -> Result<ModelClientResponse, ModelError> {
        let fut = self.client.send_request(req.clone());
        match self.policy.attempt_timeout {
            Some(limit) => timeout(limit, fut)
                .await
                .unwrap_or_else(|elapsed| Err(ModelError::timed_out(elapsed))),
            None => fut.await,
        }
    }
}
