use async_trait::async_trait;
use serde_json::{json, Value};
use slackline_core::{AppError, ErrorCode, Result};
use tracing::debug;

use crate::envelope::success;
use crate::params;
use crate::tag::normalize_emoji;
use crate::{Tool, ToolContext};

/// `slack_add_reaction` / `slack_remove_reaction`
pub struct ReactionTool {
    remove: bool,
}

impl ReactionTool {
    pub fn add() -> Self {
        Self { remove: false }
    }

    pub fn remove() -> Self {
        Self { remove: true }
    }
}

#[async_trait]
impl Tool for ReactionTool {
    fn name(&self) -> &str {
        if self.remove {
            "slack_remove_reaction"
        } else {
            "slack_add_reaction"
        }
    }

    fn description(&self) -> &str {
        if self.remove {
            "Remove a reaction (emoji) from a message in a Slack channel. \
             Only reactions added by the bot can be removed."
        } else {
            "Add a reaction (emoji) to a message in a Slack channel. \
             Use the ts of the target message as timestamp."
        }
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": {
                    "type": "string",
                    "description": "Channel name (e.g. 'general') or channel ID (e.g. 'C01234ABCDE'). If omitted, uses the configured default channel."
                },
                "timestamp": {
                    "type": "string",
                    "description": "Timestamp of the target message (e.g. '1234567890.123456')."
                },
                "reaction": {
                    "type": "string",
                    "description": "Emoji name without colons (e.g. 'thumbsup', 'heart', 'eyes', '+1')."
                }
            },
            "required": ["timestamp", "reaction"]
        })
    }

    async fn execute(&self, ctx: ToolContext<'_>, params: &Value) -> Result<Value> {
        let timestamp = params::string(params, "timestamp");
        if timestamp.is_empty() {
            return Err(AppError::new(ErrorCode::ThreadNotFound, "timestamp is required"));
        }
        let emoji = normalize_emoji(params::string(params, "reaction"));
        if emoji.is_empty() {
            return Err(AppError::new(ErrorCode::InvalidReaction, "reaction is required"));
        }

        let channel = ctx.config.resolve_channel(params::string(params, "channel"))?;
        debug!(channel = %channel, timestamp, emoji, remove = self.remove, "reaction tool");

        let result = if self.remove {
            ctx.gateway
                .remove_reaction(&channel, timestamp, emoji, ctx.cancel)
                .await?
        } else {
            ctx.gateway
                .add_reaction(&channel, timestamp, emoji, ctx.cancel)
                .await?
        };

        Ok(success(json!({
            "channel": result.channel,
            "channel_name": result.channel_name,
            "timestamp": result.timestamp,
            "reaction": result.reaction,
        })))
    }
}
