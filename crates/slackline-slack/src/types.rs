use serde::{Deserialize, Serialize};

/// Outcome of a post or thread reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostResult {
    pub channel: String,
    pub channel_name: String,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    pub message: String,
    /// Empty when the permalink lookup failed.
    pub permalink: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryOptions {
    /// Requested message count; values outside 1..=100 are clamped.
    pub limit: i64,
    pub oldest: Option<String>,
    pub latest: Option<String>,
}

pub const DEFAULT_HISTORY_LIMIT: u32 = 10;
pub const MAX_HISTORY_LIMIT: u32 = 100;

impl HistoryOptions {
    /// Non-positive means "use the default"; anything above the cap is capped.
    pub fn effective_limit(&self) -> u32 {
        if self.limit <= 0 {
            DEFAULT_HISTORY_LIMIT
        } else {
            self.limit.min(MAX_HISTORY_LIMIT as i64) as u32
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub user: String,
    /// Best-effort; empty if the user lookup failed.
    pub user_name: String,
    pub text: String,
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    pub reply_count: u32,
    /// Best-effort; empty if the permalink lookup failed.
    pub permalink: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResult {
    pub channel: String,
    pub channel_name: String,
    pub messages: Vec<HistoryMessage>,
    pub has_more: bool,
    /// Number of messages actually returned.
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionResult {
    pub channel: String,
    pub channel_name: String,
    pub timestamp: String,
    pub reaction: String,
}
