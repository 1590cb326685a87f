use serde_json::Value;

/// String parameter, empty when absent or not a string.
pub(crate) fn string<'a>(params: &'a Value, key: &str) -> &'a str {
    params.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Integer parameter. Accepts JSON numbers (fractions truncate) and numeric strings.
pub(crate) fn integer(params: &Value, key: &str, default: i64) -> i64 {
    match params.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Optional string parameter; empty counts as absent.
pub(crate) fn optional(params: &Value, key: &str) -> Option<String> {
    Some(string(params, key))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
