use schemars::{JsonSchema, schema_for};
use serde_json::Value;

use crate::ToolCallRequest;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelRequest {
    /// The input messages.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
    /// The schema the reply must conform to.
    ///
    /// Providers reject requests that set both this and `tools`.
    pub response_format: Option<ResponseFormat>,
}

impl ModelRequest {
    /// Creates a request with plain messages and nothing bound.
    #[inline]
    pub fn with_messages(messages: Vec<ModelMessage>) -> Self {
        Self {
            messages,
            tools: vec![],
            response_format: None,
        }
    }
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input text.
    User(String),
    /// An assistant reply, possibly requesting tool calls.
    Assistant {
        /// The text part of the reply.
        content: String,
        /// Tool calls requested in the reply, in order.
        tool_calls: Vec<ToolCallRequest>,
    },
    /// A tool call result.
    Tool(ToolCallResult),
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ToolCallResult {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// Name of the tool that produced the result.
    pub name: String,
    /// The result of the tool call.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}

/// A structured output the model is asked to produce instead of free text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseFormat {
    /// Name of the schema, reported to the provider.
    pub name: String,
    /// JSON schema of the expected reply.
    pub schema: Value,
}

impl ResponseFormat {
    /// Creates a response format from a raw JSON schema.
    #[inline]
    pub fn new<S: Into<String>>(name: S, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Derives the response format from a Rust type.
    #[inline]
    pub fn for_type<T: JsonSchema>(name: impl Into<String>) -> Self {
        Self::new(name, schema_for!(T).to_value())
    }
}

#[cfg(test)]
mod tests {
    use schemars::JsonSchema;

    use super::*;

    #[allow(dead_code)]
    #[derive(JsonSchema)]
    struct Verdict {
        succeeded: bool,
        summary: String,
    }

    #[test]
    fn test_response_format_for_type() {
        let format = ResponseFormat::for_type::<Verdict>("verdict");
        assert_eq!(format.name, "verdict");
        let properties = &format.schema["properties"];
        assert!(properties.get("succeeded").is_some());
        assert!(properties.get("summary").is_some());
    }
}
