use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::task::{self, Poll};

use llmbas_model::{
    ErrorKind, ModelFinishReason, ModelMessage, ModelProvider,
    ModelProviderError, ModelRequest, ModelResponse, ModelResponseEvent,
    ModelTool, ResponseFormat, ToolCallRequest,
};
use serde_json::json;

#[derive(Debug)]
struct EchoError(ErrorKind);

impl Display for EchoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for EchoError {}

impl ModelProviderError for EchoError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

/// Echoes the first user message word by word, and asks for the first
/// bound tool with the message as its `input` argument.
#[derive(Debug)]
struct EchoResponse {
    events: VecDeque<ModelResponseEvent>,
}

impl ModelResponse for EchoResponse {
    type Error = EchoError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        Poll::Ready(Ok(this.events.pop_front()))
    }
}

struct EchoProvider;

impl ModelProvider for EchoProvider {
    type Error = EchoError;
    type Response = EchoResponse;

    fn label(&self) -> String {
        "echo/echo-1".to_owned()
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let result = 'blk: {
            if !req.tools.is_empty() && req.response_format.is_some() {
                break 'blk Err(EchoError(ErrorKind::InvalidRequest));
            }
            let Some(ModelMessage::User(text)) = req.messages.first() else {
                break 'blk Err(EchoError(ErrorKind::InvalidRequest));
            };

            let mut events: VecDeque<_> = text
                .split(' ')
                .map(|word| ModelResponseEvent::MessageDelta(word.to_owned()))
                .collect();
            let finish_reason = match req.tools.first() {
                Some(tool) => {
                    events.push_back(ModelResponseEvent::ToolCall(
                        ToolCallRequest {
                            id: "call:0".to_owned(),
                            name: tool.name.clone(),
                            arguments: json!({ "input": text }),
                        },
                    ));
                    ModelFinishReason::ToolCalls
                }
                None => ModelFinishReason::Stop,
            };
            events.push_back(ModelResponseEvent::Completed(finish_reason));
            Ok(EchoResponse { events })
        };
        ready(result)
    }
}

mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use super::*;

    async fn collect(
        resp: EchoResponse,
    ) -> (Vec<String>, Vec<ToolCallRequest>, Option<ModelFinishReason>) {
        let mut resp = pin!(resp);
        let mut words = vec![];
        let mut calls = vec![];
        let mut finish_reason = None;
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap()
        {
            match event {
                ModelResponseEvent::MessageDelta(word) => words.push(word),
                ModelResponseEvent::ToolCall(call) => calls.push(call),
                ModelResponseEvent::Completed(reason) => {
                    finish_reason = Some(reason)
                }
            }
        }
        (words, calls, finish_reason)
    }

    fn probe_tool() -> ModelTool {
        ModelTool {
            name: "probe".to_owned(),
            description: "Probes a host".to_owned(),
            parameters: json!({ "type": "object" }),
        }
    }

    #[tokio::test]
    async fn test_plain_completion() {
        let req = ModelRequest::with_messages(vec![ModelMessage::User(
            "scan the host".to_owned(),
        )]);
        let resp = EchoProvider.send_request(&req).await.unwrap();
        let (words, calls, reason) = collect(resp).await;
        assert_eq!(words, ["scan", "the", "host"]);
        assert!(calls.is_empty());
        assert_eq!(reason, Some(ModelFinishReason::Stop));
    }

    #[tokio::test]
    async fn test_tool_binding() {
        let mut req = ModelRequest::with_messages(vec![ModelMessage::User(
            "scan".to_owned(),
        )]);
        req.tools.push(probe_tool());
        let resp = EchoProvider.send_request(&req).await.unwrap();
        let (_, calls, reason) = collect(resp).await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "probe");
        assert_eq!(calls[0].arguments, json!({ "input": "scan" }));
        assert_eq!(reason, Some(ModelFinishReason::ToolCalls));
    }

    #[tokio::test]
    async fn test_rejected_requests_are_not_transient() {
        let req = ModelRequest::with_messages(vec![]);
        let err = EchoProvider.send_request(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(!err.kind().is_transient());

        let mut req = ModelRequest::with_messages(vec![ModelMessage::User(
            "scan".to_owned(),
        )]);
        req.tools.push(probe_tool());
        req.response_format =
            Some(ResponseFormat::new("verdict", json!({ "type": "object" })));
        let err = EchoProvider.send_request(&req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
