//! A local fake model for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use llmbas_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    events: Vec<PresetEvent>,
    event_idx: usize,
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if this.event_idx < this.events.len() {
                let event = match &this.events[this.event_idx] {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg.clone())
                    }
                    PresetEvent::ToolCall(req) => {
                        ModelResponseEvent::ToolCall(req.clone())
                    }
                };
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(event)));
            } else if this.event_idx == this.events.len() {
                this.event_idx += 1;
                let has_tool_call = this
                    .events
                    .iter()
                    .any(|event| matches!(event, PresetEvent::ToolCall(_)));
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    if has_tool_call {
                        ModelFinishReason::ToolCalls
                    } else {
                        ModelFinishReason::Stop
                    },
                ))));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Clone)]
enum ConversationStep {
    UserInput,
    AssistantResponse(PresetResponse),
}

#[derive(Default)]
struct Journal {
    attempts: HashMap<usize, u64>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Before sending requests, you need to setup the conversation script, which
/// is how the model should respond to a request. The added steps will be
/// selected according to the history messages in your request. If there are no
/// enough steps in the script, an error will be returned.
///
/// Every request is recorded, including the failed ones, and clones of the
/// provider share the same record.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone)]
pub struct TestModelProvider {
    conversation_script: Vec<ConversationStep>,
    delay: Option<Duration>,
    failure_kind: ErrorKind,
    journal: Arc<Mutex<Journal>>,
}

impl Default for TestModelProvider {
    fn default() -> Self {
        Self {
            conversation_script: vec![],
            delay: None,
            failure_kind: ErrorKind::Network,
            journal: Default::default(),
        }
    }
}

impl TestModelProvider {
    #[inline]
    pub fn add_assistant_response_step(&mut self, preset: PresetResponse) {
        self.conversation_script
            .push(ConversationStep::AssistantResponse(preset));
    }

    #[inline]
    pub fn add_user_input_step(&mut self) {
        self.conversation_script.push(ConversationStep::UserInput);
    }

    /// Adds a user input step followed by the given assistant response.
    #[inline]
    pub fn add_turn(&mut self, preset: PresetResponse) {
        self.add_user_input_step();
        self.add_assistant_response_step(preset);
    }

    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Sets the kind of the injected failures, `Network` by default.
    #[inline]
    pub fn set_failure_kind(&mut self, kind: ErrorKind) {
        self.failure_kind = kind;
    }

    /// Returns how many requests have been sent to this provider.
    pub fn request_count(&self) -> usize {
        self.journal().requests.len()
    }

    /// Returns all requests sent to this provider, in order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.journal().requests.clone()
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, req: &ModelRequest) -> Result<TestModelResponse, Error> {
        let step_idx = req.messages.len();
        let mut journal = self.journal();
        journal.requests.push(req.clone());

        let Some(step) = self.conversation_script.get(step_idx) else {
            return Err(Error {
                message: "no enough steps",
                kind: ErrorKind::InvalidRequest,
            });
        };
        let preset = match step {
            ConversationStep::UserInput => {
                return Err(Error {
                    message: "not an assistant response step",
                    kind: ErrorKind::InvalidRequest,
                });
            }
            ConversationStep::AssistantResponse(preset) => preset,
        };

        let attempt = journal.attempts.entry(step_idx).or_default();
        *attempt += 1;
        if preset.fails_on(*attempt) {
            return Err(Error {
                message: "injected failure",
                kind: self.failure_kind,
            });
        }

        Ok(TestModelResponse {
            events: preset.events.clone(),
            event_idx: 0,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            sleep: None,
        })
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn label(&self) -> String {
        "test/scripted".to_owned()
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        ready(self.respond(req))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use llmbas_model::{ModelMessage, ModelTool, ToolCallRequest};
    use serde_json::json;

    use super::*;

    async fn collect_response(
        resp: TestModelResponse,
    ) -> (String, Option<ToolCallRequest>) {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        let mut tool_call = None;
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
                .await
                .unwrap()
                .unwrap();
            match event {
                ModelResponseEvent::Completed(_) => break,
                ModelResponseEvent::MessageDelta(delta) => {
                    msg.push_str(&delta);
                }
                ModelResponseEvent::ToolCall(req) => tool_call = Some(req),
            }
        }
        (msg, tool_call)
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_turn(PresetResponse::with_events(vec![
            PresetEvent::MessageDelta("Sure, ".to_owned()),
            PresetEvent::MessageDelta("let me take a look.".to_owned()),
            PresetEvent::ToolCall(ToolCallRequest {
                id: "tool:1".to_owned(),
                name: "read_file".to_owned(),
                arguments: json!({ "filename": "todo.txt" }),
            }),
        ]));

        let req = ModelRequest {
            messages: vec![ModelMessage::User("Check my todo".to_owned())],
            tools: vec![ModelTool {
                name: "read_file".to_owned(),
                description: "Reads a file".to_owned(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "filename": {
                            "type": "string",
                            "description": "The name of the file to read"
                        }
                    }
                }),
            }],
            response_format: None,
        };
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, tool_call) = collect_response(resp).await;
        assert_eq!(msg, "Sure, let me take a look.");
        let tool_call = tool_call.unwrap();
        assert_eq!(tool_call.name, "read_file");
        assert_eq!(tool_call.arguments, json!({ "filename": "todo.txt" }));
        assert_eq!(provider.requests(), vec![req]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let mut provider = TestModelProvider::default();
        provider.set_failure_kind(ErrorKind::RateLimitExceeded);
        provider.add_turn(PresetResponse::with_text("done").with_failures(2));

        let req = ModelRequest::with_messages(vec![ModelMessage::User(
            "Hi".to_owned(),
        )]);
        for _ in 0..2 {
            let err = provider.send_request(&req).await.err().unwrap();
            assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        }
        let resp = provider.send_request(&req).await.unwrap();
        let (msg, _) = collect_response(resp).await;
        assert_eq!(msg, "done");
        assert_eq!(provider.clone().request_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_step() {
        let provider = TestModelProvider::default();
        let req = ModelRequest::with_messages(vec![ModelMessage::User(
            "Hi".to_owned(),
        )]);
        let err = provider.send_request(&req).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
