use serde_json::{json, Value};
use slackline_core::Result;

use crate::history::GetHistoryTool;
use crate::post::{PostMessageTool, PostThreadTool};
use crate::reaction::ReactionTool;
use crate::{Tool, ToolContext};

/// The fixed set of Slack tools, looked up by wire name.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolRegistry {
    pub fn builtin() -> Self {
        Self {
            tools: vec![
                Box::new(PostMessageTool),
                Box::new(GetHistoryTool),
                Box::new(PostThreadTool),
                Box::new(ReactionTool::add()),
                Box::new(ReactionTool::remove()),
            ],
        }
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Tool listing in the shape `tools/list` returns.
    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "inputSchema": t.input_schema(),
                })
            })
            .collect()
    }

    /// Run the named tool. `None` when no tool has that name.
    pub async fn dispatch(
        &self,
        name: &str,
        ctx: ToolContext<'_>,
        params: &Value,
    ) -> Option<Result<Value>> {
        let tool = self.get(name)?;
        Some(tool.execute(ctx, params).await)
    }
}
