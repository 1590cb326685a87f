use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Stable taxonomy key identifying a failure category.
///
/// Every code maps to exactly one static remediation hint (see [`ErrorCode::hint`]),
/// written for an operator or an agent that has to decide what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ChannelNotFound,
    NotInChannel,
    InvalidAuth,
    MissingScope,
    NoText,
    NoDefaultChannel,
    ThreadNotFound,
    RateLimited,
    TokenNotConfigured,
    ConfigParseError,
    NetworkError,
    AlreadyReacted,
    NoReaction,
    InvalidReaction,
    /// The caller's cancellation token fired or its deadline passed.
    /// Never produced by [`classify`].
    Cancelled,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 15] = [
        ErrorCode::ChannelNotFound,
        ErrorCode::NotInChannel,
        ErrorCode::InvalidAuth,
        ErrorCode::MissingScope,
        ErrorCode::NoText,
        ErrorCode::NoDefaultChannel,
        ErrorCode::ThreadNotFound,
        ErrorCode::RateLimited,
        ErrorCode::TokenNotConfigured,
        ErrorCode::ConfigParseError,
        ErrorCode::NetworkError,
        ErrorCode::AlreadyReacted,
        ErrorCode::NoReaction,
        ErrorCode::InvalidReaction,
        ErrorCode::Cancelled,
    ];

    /// Taxonomy key as sent over the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ChannelNotFound => "channel_not_found",
            ErrorCode::NotInChannel => "not_in_channel",
            ErrorCode::InvalidAuth => "invalid_auth",
            ErrorCode::MissingScope => "missing_scope",
            ErrorCode::NoText => "no_text",
            ErrorCode::NoDefaultChannel => "no_default_channel",
            ErrorCode::ThreadNotFound => "thread_not_found",
            ErrorCode::RateLimited => "rate_limited",
            ErrorCode::TokenNotConfigured => "token_not_configured",
            ErrorCode::ConfigParseError => "config_parse_error",
            ErrorCode::NetworkError => "network_error",
            ErrorCode::AlreadyReacted => "already_reacted",
            ErrorCode::NoReaction => "no_reaction",
            ErrorCode::InvalidReaction => "invalid_reaction",
            ErrorCode::Cancelled => "cancelled",
        }
    }

    /// Fixed remediation hint bound to this code.
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorCode::ChannelNotFound => {
                "The channel was not found. Ask the user to verify the channel name or ID. \
                 Do not include the '#' prefix."
            }
            ErrorCode::NotInChannel => {
                "The bot is not a member of this channel. Ask the user to invite the bot \
                 by running: /invite @slackline"
            }
            ErrorCode::InvalidAuth => {
                "The Slack token is invalid or expired. Ask the user to regenerate the token \
                 at https://api.slack.com/apps"
            }
            ErrorCode::MissingScope => {
                "Required OAuth scope is missing. Ask the user to add the missing scope in \
                 Slack App settings and reinstall the app."
            }
            ErrorCode::NoText => "The message parameter is required and cannot be empty.",
            ErrorCode::NoDefaultChannel => {
                "No channel specified and no default_channel configured. Set default_channel \
                 in config or specify the channel parameter."
            }
            ErrorCode::ThreadNotFound => {
                "The thread_ts does not match any existing message. Ask the user to verify \
                 the thread timestamp."
            }
            ErrorCode::RateLimited => {
                "Slack API rate limit reached. The tool will automatically retry. If this \
                 persists, wait a moment and try again."
            }
            ErrorCode::TokenNotConfigured => {
                "No Slack token found. Ask the user to set the SLACK_BOT_TOKEN environment \
                 variable or add a token to .slack-mcp.json."
            }
            ErrorCode::ConfigParseError => {
                "Failed to parse config file. Ask the user to verify the JSON syntax in \
                 .slack-mcp.json"
            }
            ErrorCode::NetworkError => {
                "Failed to connect to Slack API. Check network connectivity and try again."
            }
            ErrorCode::AlreadyReacted => {
                "The bot has already added this reaction to the message. No action is needed."
            }
            ErrorCode::NoReaction => {
                "The bot has not added this reaction to the message, so there is nothing to \
                 remove. Only reactions added by the bot can be removed."
            }
            ErrorCode::InvalidReaction => {
                "The emoji name is invalid. Use a name without colons (e.g. 'thumbsup', \
                 'heart', 'eyes')."
            }
            ErrorCode::Cancelled => {
                "The request was cancelled or timed out before Slack answered. Retry the \
                 call if the operation is still needed."
            }
        }
    }

    /// Default human message used when a remote failure is classified.
    pub fn summary(&self) -> &'static str {
        match self {
            ErrorCode::ChannelNotFound => "channel not found",
            ErrorCode::NotInChannel => "bot is not a member of the channel",
            ErrorCode::InvalidAuth => "token is invalid",
            ErrorCode::MissingScope => "required OAuth scope is missing",
            ErrorCode::NoText => "message is empty",
            ErrorCode::NoDefaultChannel => "no channel specified and no default configured",
            ErrorCode::ThreadNotFound => "parent message not found",
            ErrorCode::RateLimited => "rate limit reached",
            ErrorCode::TokenNotConfigured => "token is not configured",
            ErrorCode::ConfigParseError => "failed to parse config file",
            ErrorCode::NetworkError => "failed to reach Slack API",
            ErrorCode::AlreadyReacted => "reaction already added",
            ErrorCode::NoReaction => "reaction does not exist",
            ErrorCode::InvalidReaction => "emoji name is invalid",
            ErrorCode::Cancelled => "operation cancelled",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote symbolic error names and the code each maps to, in priority order.
const REMOTE_SYMBOLS: &[(&str, ErrorCode)] = &[
    ("channel_not_found", ErrorCode::ChannelNotFound),
    ("not_in_channel", ErrorCode::NotInChannel),
    ("invalid_auth", ErrorCode::InvalidAuth),
    ("not_authed", ErrorCode::InvalidAuth),
    ("token_revoked", ErrorCode::InvalidAuth),
    ("token_expired", ErrorCode::InvalidAuth),
    ("account_inactive", ErrorCode::InvalidAuth),
    ("missing_scope", ErrorCode::MissingScope),
    ("thread_not_found", ErrorCode::ThreadNotFound),
    ("no_text", ErrorCode::NoText),
    ("already_reacted", ErrorCode::AlreadyReacted),
    ("no_reaction", ErrorCode::NoReaction),
    ("invalid_name", ErrorCode::InvalidReaction),
    ("ratelimited", ErrorCode::RateLimited),
    ("rate_limited", ErrorCode::RateLimited),
];

/// Map a remote error's symbolic name to a taxonomy code.
///
/// The input is split into `[A-Za-z0-9_]` tokens and each known symbol must
/// match a whole token, so `channel_not_found` inside `x_channel_not_found_y`
/// does not count. Anything unrecognised is a `network_error`.
pub fn classify(symbol: &str) -> ErrorCode {
    let tokens: Vec<&str> = symbol
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .collect();

    REMOTE_SYMBOLS
        .iter()
        .find(|(name, _)| tokens.contains(name))
        .map(|(_, code)| *code)
        .unwrap_or(ErrorCode::NetworkError)
}

/// The only error type that leaves the gateway.
#[derive(Debug, Error)]
#[error("{code}: {message}{}", .source.as_ref().map(|e| format!(" ({e})")).unwrap_or_default())]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub hint: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl AppError {
    /// Build an error whose hint comes from the taxonomy table.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: code.hint().to_string(),
            source: None,
        }
    }

    /// Build an error with a caller-supplied hint instead of the table entry.
    pub fn with_hint(code: ErrorCode, message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: hint.into(),
            source: None,
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, ErrorCode::Cancelled.summary())
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(err));
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == ErrorCode::Cancelled
    }

    /// Text form used in tool-call error results.
    pub fn format_for_tool(&self) -> String {
        format!("Error [{}]: {}\nHint: {}", self.code, self.message, self.hint)
    }

    /// Structured form used by JSON output.
    pub fn to_json(&self) -> Value {
        json!({
            "code": self.code,
            "message": self.message,
            "hint": self.hint,
        })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Hide the secret part of a Slack token (`xoxb-1234` → `xoxb-****`).
///
/// Strings without a known token prefix are returned unchanged.
pub fn mask_token(s: &str) -> String {
    const PREFIXES: [&str; 3] = ["xoxb-", "xoxp-", "xoxs-"];
    PREFIXES
        .iter()
        .find(|p| s.starts_with(*p))
        .map(|p| format!("{p}****"))
        .unwrap_or_else(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_code_has_a_hint_and_summary() {
        for code in ErrorCode::ALL {
            assert!(!code.hint().is_empty(), "{code} has no hint");
            assert!(!code.summary().is_empty(), "{code} has no summary");
        }
    }

    #[test]
    fn codes_serialize_as_taxonomy_keys() {
        for code in ErrorCode::ALL {
            let json = serde_json::to_value(code).unwrap();
            assert_eq!(json, Value::String(code.as_str().to_string()));
        }
    }

    #[test]
    fn classify_matches_known_symbols() {
        assert_eq!(classify("channel_not_found"), ErrorCode::ChannelNotFound);
        assert_eq!(classify("slack error: not_in_channel"), ErrorCode::NotInChannel);
        assert_eq!(classify("not_authed"), ErrorCode::InvalidAuth);
        assert_eq!(classify("invalid_auth"), ErrorCode::InvalidAuth);
        assert_eq!(classify("missing_scope"), ErrorCode::MissingScope);
        assert_eq!(classify("thread_not_found"), ErrorCode::ThreadNotFound);
        assert_eq!(classify("no_text"), ErrorCode::NoText);
        assert_eq!(classify("already_reacted"), ErrorCode::AlreadyReacted);
        assert_eq!(classify("no_reaction"), ErrorCode::NoReaction);
        assert_eq!(classify("invalid_name"), ErrorCode::InvalidReaction);
        assert_eq!(classify("ratelimited"), ErrorCode::RateLimited);
    }

    #[test]
    fn classify_requires_whole_token() {
        assert_eq!(classify("archived_channel_not_found_x"), ErrorCode::NetworkError);
        assert_eq!(classify("no_texture"), ErrorCode::NetworkError);
    }

    #[test]
    fn classify_is_total() {
        for input in ["", " ", "connection reset by peer", "???", "500 Internal"] {
            let code = classify(input);
            assert_eq!(code, ErrorCode::NetworkError, "input {input:?}");
            assert_ne!(code, ErrorCode::Cancelled);
        }
    }

    #[test]
    fn hint_defaults_from_table() {
        let err = AppError::new(ErrorCode::NoDefaultChannel, "nothing to post to");
        assert_eq!(err.hint, ErrorCode::NoDefaultChannel.hint());
        assert!(err.hint.contains("default_channel"));
    }

    #[test]
    fn custom_hint_overrides_table() {
        let err = AppError::with_hint(ErrorCode::NetworkError, "boom", "try later");
        assert_eq!(err.hint, "try later");
    }

    #[test]
    fn display_includes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "socket closed");
        let err = AppError::new(ErrorCode::NetworkError, "failed").with_source(io);
        assert_eq!(err.to_string(), "network_error: failed (socket closed)");
        assert!(std::error::Error::source(&err).is_some());

        let bare = AppError::new(ErrorCode::NoText, "message is empty");
        assert_eq!(bare.to_string(), "no_text: message is empty");
    }

    #[test]
    fn tool_format_is_stable() {
        let err = AppError::new(ErrorCode::NoText, "message is empty");
        assert_eq!(
            err.format_for_tool(),
            format!("Error [no_text]: message is empty\nHint: {}", ErrorCode::NoText.hint())
        );
    }

    #[test]
    fn json_form_has_three_fields() {
        let err = AppError::new(ErrorCode::ChannelNotFound, "channel not found: nope");
        let json = err.to_json();
        assert_eq!(json["code"], "channel_not_found");
        assert_eq!(json["message"], "channel not found: nope");
        assert_eq!(json["hint"], ErrorCode::ChannelNotFound.hint());
    }

    #[test]
    fn mask_token_hides_secret() {
        assert_eq!(mask_token("xoxb-1234-abcd"), "xoxb-****");
        assert_eq!(mask_token("xoxp-9"), "xoxp-****");
        assert_eq!(mask_token("abc"), "abc");
        assert_eq!(mask_token("${SLACK_BOT_TOKEN}"), "${SLACK_BOT_TOKEN}");
    }
}
