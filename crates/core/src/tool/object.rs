use std::future::ready;
use std::pin::Pin;

use llmbas_model::ModelTool;
use serde_json::Value;
use tracing::Instrument;

use super::{Error, Tool, ToolResult};

type ToolFuture = Pin<Box<dyn Future<Output = ToolResult> + Send>>;

/// A [`Tool`] with its input type erased, so tools of different types can
/// live in one [`ToolSet`](super::ToolSet).
pub(crate) trait ToolObject: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn definition(&self) -> ModelTool;

    /// Decodes `arguments` and starts the tool. Undecodable arguments
    /// resolve to an `InvalidInput` error without running the tool.
    fn execute(&self, call_id: &str, arguments: Value) -> ToolFuture;
}

impl<T: Tool> ToolObject for T {
    #[inline]
    fn name(&self) -> &str {
        Tool::name(self)
    }

    fn definition(&self) -> ModelTool {
        ModelTool {
            name: Tool::name(self).to_owned(),
            description: self.description().to_owned(),
            parameters: self.parameter_schema().clone(),
        }
    }

    fn execute(&self, call_id: &str, arguments: Value) -> ToolFuture {
        let name = Tool::name(self);
        let input = match serde_json::from_value::<T::Input>(arguments) {
            Ok(input) => input,
            Err(err) => {
                debug!(tool = name, call_id, error = %err, "bad arguments");
                let err = Error::invalid_input()
                    .with_reason(format!("arguments of `{name}`: {err}"));
                return Box::pin(ready(Err(err)));
            }
        };
        let span = debug_span!("tool execute", tool = name, call_id);
        Box::pin(Tool::execute(self, input).instrument(span))
    }
}
