use std::process::ExitCode;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde_json::{json, Map, Value};
use slackline_core::Config;
use slackline_slack::Gateway;
use slackline_tools::envelope::to_json;
use slackline_tools::{ToolContext, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::Command;

/// Deadline for one CLI command.
const CLI_TIMEOUT: Duration = Duration::from_secs(10);
/// History text longer than this is cut in the text view.
const MAX_TEXT_CHARS: usize = 200;

/// Map a subcommand to its tool name and parameter bag.
pub fn invocation(command: Command) -> Option<(&'static str, Value)> {
    let mut params = Map::new();
    let mut put = |key: &str, value: Option<Value>| {
        if let Some(v) = value {
            params.insert(key.to_string(), v);
        }
    };

    let tool = match command {
        Command::Post {
            message,
            display_name,
        } => {
            put("message", Some(json!(message)));
            put("display_name", display_name.map(Value::String));
            "slack_post_message"
        }
        Command::Reply {
            thread_ts,
            message,
            display_name,
        } => {
            put("thread_ts", Some(json!(thread_ts)));
            put("message", Some(json!(message)));
            put("display_name", display_name.map(Value::String));
            "slack_post_thread"
        }
        Command::History {
            limit,
            oldest,
            latest,
        } => {
            put("limit", Some(json!(limit)));
            put("oldest", oldest.map(Value::String));
            put("latest", latest.map(Value::String));
            "slack_get_history"
        }
        Command::React {
            timestamp,
            reaction,
        } => {
            put("timestamp", Some(json!(timestamp)));
            put("reaction", Some(json!(reaction)));
            "slack_add_reaction"
        }
        Command::Unreact {
            timestamp,
            reaction,
        } => {
            put("timestamp", Some(json!(timestamp)));
            put("reaction", Some(json!(reaction)));
            "slack_remove_reaction"
        }
        Command::Serve | Command::Version => return None,
    };
    Some((tool, Value::Object(params)))
}

/// Run one tool under the CLI deadline and Ctrl-C, then print the outcome.
pub async fn run_tool(
    gateway: &dyn Gateway,
    config: &Config,
    tool: &str,
    params: Value,
    as_json: bool,
) -> anyhow::Result<ExitCode> {
    let cancel = CancellationToken::new();
    let watchdog = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(CLI_TIMEOUT) => debug!("command deadline reached"),
                _ = tokio::signal::ctrl_c() => debug!("interrupted"),
            }
            cancel.cancel();
        })
    };

    let ctx = ToolContext {
        gateway,
        config,
        cancel: &cancel,
    };
    let outcome = ToolRegistry::builtin()
        .dispatch(tool, ctx, &params)
        .await
        .ok_or_else(|| anyhow::anyhow!("unknown tool: {tool}"))?;
    watchdog.abort();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&to_json(&outcome))?);
        return Ok(if outcome.is_ok() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    match outcome {
        Ok(value) => {
            println!("{}", render_text(tool, &value));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn print_version(as_json: bool) {
    let version = env!("CARGO_PKG_VERSION");
    if as_json {
        println!("{}", json!({ "name": "slackline", "version": version }));
    } else {
        println!("slackline {version}");
    }
}

fn channel_label(value: &Value) -> String {
    let name = str_field(value, "channel_name");
    if name.is_empty() {
        str_field(value, "channel").to_string()
    } else {
        format!("#{name}")
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Human view of a success envelope.
fn render_text(tool: &str, value: &Value) -> String {
    match tool {
        "slack_post_message" | "slack_post_thread" => {
            let verb = if tool == "slack_post_thread" {
                "Reply posted to"
            } else {
                "Message posted to"
            };
            let mut out = format!("{verb} {} (ts {})", channel_label(value), str_field(value, "ts"));
            let permalink = str_field(value, "permalink");
            if !permalink.is_empty() {
                out.push_str(&format!("\n{permalink}"));
            }
            out
        }
        "slack_get_history" => render_history(value),
        "slack_add_reaction" => format!(
            "Added :{}: to {} in {}",
            str_field(value, "reaction"),
            str_field(value, "timestamp"),
            channel_label(value)
        ),
        "slack_remove_reaction" => format!(
            "Removed :{}: from {} in {}",
            str_field(value, "reaction"),
            str_field(value, "timestamp"),
            channel_label(value)
        ),
        _ => value.to_string(),
    }
}

fn render_history(value: &Value) -> String {
    let rule = "-".repeat(60);
    let messages = value
        .get("messages")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut lines = vec![
        format!("{} - {} messages", channel_label(value), messages.len()),
        rule.clone(),
    ];
    for msg in messages {
        let author = match str_field(msg, "user_name") {
            "" => str_field(msg, "user"),
            name => name,
        };
        let ts = str_field(msg, "ts");
        lines.push(format!(
            "  {}  @{:<16} {}",
            local_time(ts),
            author,
            truncate(str_field(msg, "text"), MAX_TEXT_CHARS)
        ));

        let replies = msg.get("reply_count").and_then(Value::as_u64).unwrap_or(0);
        if replies > 0 {
            lines.push(format!("{:20}{replies} replies (thread_ts: {ts})", ""));
        }
    }
    lines.push(rule);
    if value.get("has_more").and_then(Value::as_bool) == Some(true) {
        lines.push("  (more messages available, raise --limit to see them)".to_string());
    }
    lines.join("\n")
}

/// Slack `ts` (`"1700000000.000100"`) as local `YYYY-MM-DD HH:MM`; unparsable input is echoed.
fn local_time(ts: &str) -> String {
    ts.split('.')
        .next()
        .and_then(|secs| secs.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
