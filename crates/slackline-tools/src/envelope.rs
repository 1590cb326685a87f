use serde_json::{Map, Value};
use slackline_core::Result;

use crate::ToolResult;

/// `{"ok": true, ...fields}`.
pub fn success(fields: Value) -> Value {
    let mut map = Map::new();
    map.insert("ok".to_string(), Value::Bool(true));
    if let Value::Object(fields) = fields {
        map.extend(fields);
    }
    Value::Object(map)
}

/// Tool-calling form: compact JSON on success, the hinted error text on failure.
pub fn to_tool_result(outcome: &Result<Value>) -> ToolResult {
    match outcome {
        Ok(value) => ToolResult::success(value.to_string()),
        Err(e) => ToolResult::error(e.format_for_tool()),
    }
}

/// Structured form: the success map, or `{code, message, hint}`.
pub fn to_json(outcome: &Result<Value>) -> Value {
    match outcome {
        Ok(value) => value.clone(),
        Err(e) => e.to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slackline_core::{AppError, ErrorCode};

    #[test]
    fn success_prepends_ok() {
        let value = success(json!({
            "channel": "C0123456789",
            "channel_name": "general",
            "timestamp": "1.0",
            "reaction": "eyes",
        }));
        assert_eq!(value["ok"], true);
        assert_eq!(value["reaction"], "eyes");
        assert_eq!(value.as_object().map(|m| m.len()), Some(5));
    }

    #[test]
    fn failure_renders_both_forms() {
        let outcome: Result<Value> = Err(AppError::new(ErrorCode::NoText, "message is empty"));
        let result = to_tool_result(&outcome);
        assert!(result.is_error);
        assert!(result.content.starts_with("Error [no_text]: message is empty\nHint: "));
        assert_eq!(to_json(&outcome)["code"], "no_text");
    }
}
