use std::sync::Arc;

use llmbas_core::Tool;
use llmbas_core::tool::{Error, ToolResult};
use rmcp::model::{CallToolRequestParams, CallToolResult, JsonObject};
use serde_json::Value;

use super::McpSession;

/// A tool served by an MCP server.
pub struct McpTool {
    server: Arc<str>,
    name: String,
    description: String,
    parameter_schema: Value,
    session: Arc<McpSession>,
}

impl McpTool {
    pub(super) fn new(
        server: &str,
        tool: rmcp::model::Tool,
        session: Arc<McpSession>,
    ) -> Self {
        Self {
            server: server.into(),
            name: tool.name.into_owned(),
            description: tool
                .description
                .map(|desc| desc.into_owned())
                .unwrap_or_default(),
            parameter_schema: Value::Object((*tool.input_schema).clone()),
            session,
        }
    }

    /// Returns the name of the server providing this tool.
    #[inline]
    pub fn server(&self) -> &str {
        &self.server
    }
}

impl Tool for McpTool {
    type Input = Value;

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(
        &self,
        input: Value,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let session = Arc::clone(&self.session);
        let server = Arc::clone(&self.server);
        let name = self.name.clone();
        async move {
            let arguments = coerce_arguments(input)?;
            trace!(
                module = "MCP",
                server = &*server,
                tool = name.as_str(),
                "call"
            );
            let result = session
                .call_tool(CallToolRequestParams {
                    meta: None,
                    name: name.into(),
                    arguments,
                    task: None,
                })
                .await
                .map_err(|err| {
                    Error::execution_error()
                        .with_reason(format!("MCP server `{server}`: {err}"))
                })?;
            render_result(result)
        }
    }
}

fn coerce_arguments(input: Value) -> Result<Option<JsonObject>, Error> {
    match input {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(Error::invalid_input()
            .with_reason(format!("expected a JSON object, got {other}"))),
    }
}

/// Joins the text parts of a call result, one per line.
fn render_result(result: CallToolResult) -> ToolResult {
    let text = result
        .content
        .iter()
        .filter_map(|content| content.as_text())
        .map(|content| content.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let text = match (text.is_empty(), result.structured_content) {
        (true, Some(structured)) => structured.to_string(),
        _ => text,
    };

    if result.is_error.unwrap_or(false) {
        return Err(Error::execution_error().with_reason(text));
    }
    Ok(text)
}
