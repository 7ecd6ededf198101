use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use llmbas_model::ModelTool;
use tokio::time::timeout;

use super::object::ToolObject;
use super::{Error, Tool, ToolResult};
use crate::conversation::ToolCall;

/// The tools available to a run, in registration order.
///
/// The set is read-only once a run starts, clones share the same tools.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn ToolObject>>,
    by_name: HashMap<String, usize>,
}

impl ToolSet {
    /// Registers a tool. A tool with the same name replaces the earlier one.
    pub fn add_tool<T: Tool>(&mut self, tool: T) {
        let tool: Arc<dyn ToolObject> = Arc::new(tool);
        let name = tool.name().to_owned();
        match self.by_name.get(&name) {
            Some(&idx) => {
                warn!("tool `{name}` registered twice, keeping the last one");
                self.tools[idx] = tool;
            }
            None => {
                self.by_name.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Returns the number of tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if there are no tools.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Returns the names of the tools.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name())
    }

    /// Returns the definitions sent to the model.
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    /// Calls the tool named by `call`, optionally bounded by `limit`.
    pub async fn call(
        &self,
        call: &ToolCall,
        limit: Option<Duration>,
    ) -> ToolResult {
        let Some(&idx) = self.by_name.get(&call.name) else {
            warn!("tool not found: {}", call.name);
            return Err(Error::not_found().with_reason(format!(
                "no tool named `{}` is available",
                call.name
            )));
        };
        trace!("calling a tool ({}) with args: {:?}", call.id, call.arguments);
        let fut = self.tools[idx].execute(&call.id, call.arguments.clone());
        match limit {
            Some(limit) => timeout(limit, fut).await.unwrap_or_else(|_| {
                Err(Error::timed_out().with_reason(format!(
                    "no result after {}s",
                    limit.as_secs_f64()
                )))
            }),
            None => fut.await,
        }
    }
}

impl Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
