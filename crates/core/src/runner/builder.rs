use std::time::Duration;

use llmbas_model::{ModelProvider, ResponseFormat};
use tokio_util::sync::CancellationToken;

use super::Runner;
use crate::conversation::ConversationState;
use crate::error::{ConfigError, RunError};
use crate::graph::{ActNode, ExecutionGraph, PromptTemplate, ReasonNode};
use crate::invoker::{ResilientInvoker, RetryPolicy};
use crate::model_client::{ModelBinding, ModelClient};
use crate::observer::{Observer, UpdateObserver};
use crate::tool::{Tool, ToolSet};

/// [`Runner`] builder.
pub struct RunnerBuilder {
    model_client: ModelClient,
    tools: ToolSet,
    retry_policy: RetryPolicy,
    tool_timeout: Option<Duration>,
    prompt_template: Option<String>,
    response_format: Option<ResponseFormat>,
    cancel: Option<CancellationToken>,
    observer: Option<Box<dyn Observer>>,
}

impl RunnerBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            tools: ToolSet::default(),
            retry_policy: RetryPolicy::default(),
            tool_timeout: None,
            prompt_template: None,
            response_format: None,
            cancel: None,
            observer: None,
        }
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.tools.add_tool(tool);
        self
    }

    /// Registers tools of the same type, e.g. the ones discovered at runtime.
    #[inline]
    pub fn with_tools<T, I>(mut self, tools: I) -> Self
    where
        T: Tool,
        I: IntoIterator<Item = T>,
    {
        for tool in tools {
            self.tools.add_tool(tool);
        }
        self
    }

    /// Sets how model invocations are retried.
    #[inline]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Bounds every tool call by `timeout`.
    #[inline]
    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    /// Replaces the built-in prompt template.
    ///
    /// The template must contain a `{task}` placeholder.
    #[inline]
    pub fn with_prompt_template<S: Into<String>>(
        mut self,
        template: S,
    ) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    /// Asks the model for a structured reply.
    ///
    /// A model can't be bound to tools and a schema at once, so building a
    /// runner with both fails.
    #[inline]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Uses an existing token for cancellation.
    #[inline]
    pub fn with_cancellation_token(
        mut self,
        token: CancellationToken,
    ) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Replaces the default logging observer.
    #[inline]
    pub fn with_observer<O: Observer + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Builds the runner.
    pub fn build(self) -> Result<Runner, ConfigError> {
        if self.tools.is_empty() {
            error!(module = "RUN", "no tools are available");
            return Err(ConfigError::NoTools);
        }
        debug!(module = "RUN", tools = ?self.tools, "building runner");

        let binding =
            ModelBinding::new(self.tools.definitions(), self.response_format)?;
        let template = match self.prompt_template {
            Some(template) => PromptTemplate::new(template)?,
            None => PromptTemplate::default(),
        };
        let cancel = self.cancel.unwrap_or_default();

        let invoker =
            ResilientInvoker::new(self.model_client, self.retry_policy);
        let graph = ExecutionGraph::default()
            .with_node(ReasonNode::new(
                invoker,
                binding,
                template,
                cancel.clone(),
            ))
            .with_node(ActNode::new(
                self.tools,
                self.tool_timeout,
                cancel.clone(),
            ));

        Ok(Runner {
            graph,
            observer: self
                .observer
                .unwrap_or_else(|| Box::new(UpdateObserver::default())),
            cancel,
            span: info_span!("runner", logger = "LLMBAS"),
        })
    }

    /// Builds the runner and runs `task` once.
    pub async fn run<S: Into<String>>(
        self,
        task: S,
    ) -> Result<ConversationState, RunError> {
        self.build()?.run(task).await
    }
}
