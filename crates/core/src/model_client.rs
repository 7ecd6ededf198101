use std::error::Error as StdError;
use std::future::poll_fn;
use std::pin::{Pin, pin};
use std::sync::Arc;

use llmbas_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider, ModelRequest,
    ModelResponse, ModelResponseEvent, ModelTool, ResponseFormat,
    ToolCallRequest,
};
use tracing::Instrument;

use crate::error::ConfigError;

type SendRequestResult = Result<ModelClientResponse, ModelError>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
type HandlerFn =
    Arc<dyn Fn(ModelRequest) -> BoxedSendRequestFuture + Send + Sync>;

/// A wrapper around a model provider that provides a type-erased
/// interface for the other modules.
#[derive(Clone)]
pub struct ModelClient {
    label: String,
    handler_fn: HandlerFn,
}

impl ModelClient {
    /// Wraps the given provider.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let label = provider.label();
        // We have to erase the type `P`, since `ModelClient` doesn't have a
        // generic parameter and we don't want it either.
        let handler_fn: HandlerFn = Arc::new(move |req| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp = fut.await.map_err(ModelError::from_provider)?;
                    handle_response::<P>(resp).await
                }
                .instrument(trace_span!("model client req")),
            )
        });
        Self { label, handler_fn }
    }

    /// Returns the `provider/model` label of the wrapped provider.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Sends a request and collects the whole response.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    #[inline]
    pub async fn send_request(
        &self,
        req: ModelRequest,
    ) -> Result<ModelClientResponse, ModelError> {
        (self.handler_fn)(req).await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug, Default)]
pub struct ModelClientResponse {
    /// The concatenated text deltas.
    pub transcript: String,
    /// Tool calls requested by the model.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

/// A failed model call, reduced to its kind and the provider's error.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {source}")]
pub struct ModelError {
    kind: ErrorKind,
    source: Box<dyn StdError + Send + Sync>,
}

impl ModelError {
    fn from_provider<E: llmbas_model::ModelProviderError>(err: E) -> Self {
        Self {
            kind: err.kind(),
            source: Box::new(err),
        }
    }

    pub(crate) fn timed_out(elapsed: tokio::time::error::Elapsed) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            source: Box::new(elapsed),
        }
    }

    /// Returns the kind of this error.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if sending the same request again may succeed.
    #[inline]
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

/// What a model is bound to when it is asked for a reply.
///
/// A model can either be offered a set of tools, or be asked to reply with
/// a structured output, but never both.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ModelBinding {
    /// Plain text replies.
    #[default]
    Unbound,
    /// The model may request calls to these tools.
    Tools(Vec<ModelTool>),
    /// The model must reply with this schema.
    Schema(ResponseFormat),
}

impl ModelBinding {
    /// Validates the combination and creates a binding.
    pub fn new(
        tools: Vec<ModelTool>,
        schema: Option<ResponseFormat>,
    ) -> Result<Self, ConfigError> {
        match (tools.is_empty(), schema) {
            (false, Some(_)) => {
                error!(
                    module = "CLIENT",
                    "schema and tools should not be bound at the same time"
                );
                Err(ConfigError::SchemaWithTools)
            }
            (true, Some(schema)) => {
                debug!(
                    module = "CLIENT",
                    schema = %schema.name,
                    "bind the schema to the model"
                );
                Ok(Self::Schema(schema))
            }
            (false, None) => {
                debug!(
                    module = "CLIENT",
                    tools = tools.len(),
                    "bind the tools to the model"
                );
                Ok(Self::Tools(tools))
            }
            (true, None) => Ok(Self::Unbound),
        }
    }

    /// Creates a request carrying the given messages under this binding.
    pub fn request(&self, messages: Vec<ModelMessage>) -> ModelRequest {
        let mut req = ModelRequest::with_messages(messages);
        match self {
            ModelBinding::Unbound => {}
            ModelBinding::Tools(tools) => req.tools = tools.clone(),
            ModelBinding::Schema(schema) => {
                req.response_format = Some(schema.clone())
            }
        }
        req
    }
}

async fn handle_response<P: ModelProvider + 'static>(
    resp: P::Response,
) -> SendRequestResult {
    let mut transcript = String::new();
    let mut tool_calls = Vec::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event = poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx))
            .await
            .map_err(ModelError::from_provider)?;
        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                transcript.push_str(&msg);
            }
            ModelResponseEvent::ToolCall(req) => {
                tool_calls.push(req);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        transcript,
        tool_calls,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use llmbas_test_model::{PresetEvent, PresetResponse, TestModelProvider};
    use serde_json::json;

    use super::*;

    fn hello() -> Vec<ModelMessage> {
        vec![ModelMessage::User("Hi".to_owned())]
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_turn(PresetResponse::with_events([
            PresetEvent::MessageDelta("How ".to_owned()),
            PresetEvent::MessageDelta("are ".to_owned()),
            PresetEvent::MessageDelta("you?".to_owned()),
        ]));

        let model_client = ModelClient::new(model_provider);
        assert_eq!(model_client.label(), "test/scripted");

        for _ in 0..3 {
            let resp = model_client
                .send_request(ModelRequest::with_messages(hello()))
                .await
                .unwrap();
            assert_eq!(resp.transcript, "How are you?");
            assert_eq!(resp.finish_reason, Some(ModelFinishReason::Stop));
        }
    }

    #[tokio::test]
    async fn test_error_handling() {
        let model_provider = TestModelProvider::default();
        let model_client = ModelClient::new(model_provider);
        let err = model_client
            .send_request(ModelRequest::with_messages(hello()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_binding_is_exclusive() {
        let tool = ModelTool {
            name: "list_dir".to_owned(),
            description: "Lists a directory".to_owned(),
            parameters: json!({ "type": "object" }),
        };
        let schema =
            ResponseFormat::new("verdict", json!({ "type": "object" }));

        let err = ModelBinding::new(vec![tool.clone()], Some(schema.clone()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::SchemaWithTools));

        let req = ModelBinding::new(vec![tool.clone()], None)
            .unwrap()
            .request(hello());
        assert_eq!(req.tools, vec![tool]);
        assert!(req.response_format.is_none());

        let req = ModelBinding::new(vec![], Some(schema.clone()))
            .unwrap()
            .request(hello());
        assert!(req.tools.is_empty());
        assert_eq!(req.response_format, Some(schema));
    }
}
