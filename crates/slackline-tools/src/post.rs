use async_trait::async_trait;
use serde_json::{json, Value};
use slackline_core::{AppError, ErrorCode, Result};
use slackline_slack::PostResult;
use tracing::debug;

use crate::envelope::success;
use crate::params;
use crate::tag::append_display_name_tag;
use crate::{Tool, ToolContext};

const CHANNEL_DESCRIPTION: &str = "Channel name (e.g. 'general') or channel ID \
    (e.g. 'C01234ABCDE'). If omitted, uses the configured default channel.";
const DISPLAY_NAME_DESCRIPTION: &str = "Display name of the sender (e.g. AI agent persona \
    name). If provided, appends #display_name hashtag to the message.";

/// `slack_post_message`
pub struct PostMessageTool;

/// `slack_post_thread`
pub struct PostThreadTool;

fn post_envelope(result: PostResult) -> Value {
    let mut fields = json!({
        "channel": result.channel,
        "channel_name": result.channel_name,
        "ts": result.ts,
        "message": result.message,
        "permalink": result.permalink,
    });
    if let Some(thread_ts) = result.thread_ts {
        fields["thread_ts"] = Value::String(thread_ts);
    }
    success(fields)
}

fn require_text(params: &Value) -> Result<&str> {
    let message = params::string(params, "message");
    if message.is_empty() {
        return Err(AppError::new(ErrorCode::NoText, "message is empty"));
    }
    Ok(message)
}

#[async_trait]
impl Tool for PostMessageTool {
    fn name(&self) -> &str {
        "slack_post_message"
    }

    fn description(&self) -> &str {
        "Post a message to a Slack channel. Supports Slack mrkdwn formatting \
         (bold, italic, links, code blocks). If channel is omitted, posts to the \
         configured default channel. The bot must be invited to the target channel first."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": { "type": "string", "description": CHANNEL_DESCRIPTION },
                "message": {
                    "type": "string",
                    "description": "Message text to post. Supports Slack mrkdwn: *bold*, _italic_, `code`, ```code block```, <url|text>."
                },
                "display_name": { "type": "string", "description": DISPLAY_NAME_DESCRIPTION }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, ctx: ToolContext<'_>, params: &Value) -> Result<Value> {
        let message = require_text(params)?;
        let channel = ctx.config.resolve_channel(params::string(params, "channel"))?;
        let display_name = ctx
            .config
            .resolve_display_name(params::string(params, "display_name"));
        let text = append_display_name_tag(message, &display_name);

        debug!(channel = %channel, "slack_post_message");
        let result = ctx.gateway.post_message(&channel, &text, ctx.cancel).await?;
        Ok(post_envelope(result))
    }
}

#[async_trait]
impl Tool for PostThreadTool {
    fn name(&self) -> &str {
        "slack_post_thread"
    }

    fn description(&self) -> &str {
        "Post a reply to an existing message thread in a Slack channel. \
         Use the ts of the parent message as thread_ts."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": { "type": "string", "description": CHANNEL_DESCRIPTION },
                "thread_ts": {
                    "type": "string",
                    "description": "Timestamp of the parent message to reply to (e.g. '1234567890.123456')."
                },
                "message": { "type": "string", "description": "Reply text to post. Supports Slack mrkdwn." },
                "display_name": { "type": "string", "description": DISPLAY_NAME_DESCRIPTION }
            },
            "required": ["thread_ts", "message"]
        })
    }

    async fn execute(&self, ctx: ToolContext<'_>, params: &Value) -> Result<Value> {
        let message = require_text(params)?;
        let thread_ts = params::string(params, "thread_ts");
        if thread_ts.is_empty() {
            return Err(AppError::new(ErrorCode::ThreadNotFound, "thread_ts is required"));
        }

        let channel = ctx.config.resolve_channel(params::string(params, "channel"))?;
        let display_name = ctx
            .config
            .resolve_display_name(params::string(params, "display_name"));
        let text = append_display_name_tag(message, &display_name);

        debug!(channel = %channel, thread_ts, "slack_post_thread");
        let result = ctx
            .gateway
            .post_thread(&channel, thread_ts, &text, ctx.cancel)
            .await?;
        Ok(post_envelope(result))
    }
}
