use async_trait::async_trait;
use serde_json::{json, Value};
use slackline_core::Result;
use slackline_slack::HistoryOptions;
use tracing::debug;

use crate::envelope::success;
use crate::params;
use crate::{Tool, ToolContext};

/// `slack_get_history`
pub struct GetHistoryTool;

#[async_trait]
impl Tool for GetHistoryTool {
    fn name(&self) -> &str {
        "slack_get_history"
    }

    fn description(&self) -> &str {
        "Get message history from a Slack channel. Returns messages with author, \
         text, timestamp and permalink. If channel is omitted, reads the configured \
         default channel."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": {
                    "type": "string",
                    "description": "Channel name (e.g. 'general') or channel ID (e.g. 'C01234ABCDE'). If omitted, uses the configured default channel."
                },
                "limit": {
                    "type": "number",
                    "description": "Number of messages to retrieve (1-100). Defaults to 10."
                },
                "oldest": {
                    "type": "string",
                    "description": "Start of time range (Unix timestamp). Only messages after this time are included."
                },
                "latest": {
                    "type": "string",
                    "description": "End of time range (Unix timestamp). Only messages before this time are included."
                }
            }
        })
    }

    async fn execute(&self, ctx: ToolContext<'_>, params: &Value) -> Result<Value> {
        let channel = ctx.config.resolve_channel(params::string(params, "channel"))?;
        let options = HistoryOptions {
            limit: params::integer(params, "limit", 10),
            oldest: params::optional(params, "oldest"),
            latest: params::optional(params, "latest"),
        };

        debug!(channel = %channel, limit = options.limit, "slack_get_history");
        let result = ctx.gateway.get_history(&channel, &options, ctx.cancel).await?;
        Ok(success(json!({
            "channel": result.channel,
            "channel_name": result.channel_name,
            "messages": result.messages,
            "has_more": result.has_more,
            "count": result.count,
        })))
    }
}
