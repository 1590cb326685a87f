use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{is_rate_limit_symbol, ApiResult, SlackApiError};

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelPage {
    pub channels: Vec<ChannelEntry>,
    /// `None` once the listing is exhausted.
    pub next_cursor: Option<String>,
}

/// Paginated channel listing.
#[async_trait]
pub trait ChannelDirectory: Send + Sync {
    async fn list_channels(
        &self,
        types: &[&str],
        cursor: Option<&str>,
        limit: u32,
    ) -> ApiResult<ChannelPage>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostedMessage {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ts: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub reply_count: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: u32,
    pub oldest: Option<String>,
    pub latest: Option<String>,
}

/// Remote messaging calls used by the gateway. Every method returns the raw
/// [`SlackApiError`]; classification happens one layer up.
#[async_trait]
pub trait SlackApi: ChannelDirectory {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> ApiResult<PostedMessage>;

    async fn history(&self, channel: &str, query: &HistoryQuery) -> ApiResult<HistoryPage>;

    async fn permalink(&self, channel: &str, ts: &str) -> ApiResult<String>;

    async fn user_name(&self, user_id: &str) -> ApiResult<String>;

    async fn add_reaction(&self, channel: &str, ts: &str, name: &str) -> ApiResult<()>;

    async fn remove_reaction(&self, channel: &str, ts: &str, name: &str) -> ApiResult<()>;
}

/// Web API client authenticated with a bot token.
pub struct HttpSlackApi {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl HttpSlackApi {
    pub fn new(token: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, form: &[(&str, &str)]) -> ApiResult<T> {
        let url = format!("{}/{}", self.base_url, method);
        debug!(method, "calling Slack API");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .form(form)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry_after = parse_retry_after(
                resp.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()),
            );
            warn!(method, ?retry_after, "Slack API rate limited");
            return Err(SlackApiError::RateLimited { retry_after });
        }

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(method, status, body = %body, "Slack API HTTP error");
            return Err(SlackApiError::Status { status, body });
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| SlackApiError::Decode(e.to_string()))?;
        let body = check_envelope(body)?;
        serde_json::from_value(body).map_err(|e| SlackApiError::Decode(e.to_string()))
    }
}

/// Unwrap the `{"ok": ..., "error": ...}` envelope every Web API method returns.
pub(crate) fn check_envelope(body: Value) -> ApiResult<Value> {
    if body.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(body);
    }
    let symbol = body
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown_error");
    if is_rate_limit_symbol(symbol) {
        return Err(SlackApiError::RateLimited { retry_after: None });
    }
    Err(SlackApiError::Api(symbol.to_string()))
}

/// `Retry-After` in whole seconds; missing, malformed or zero means no hint.
pub(crate) fn parse_retry_after(header: Option<&str>) -> Option<Duration> {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    channels: Vec<ChannelEntry>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Deserialize)]
struct PermalinkResponse {
    permalink: String,
}

#[derive(Deserialize)]
struct UserInfoResponse {
    user: UserInfo,
}

#[derive(Deserialize)]
struct UserInfo {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct Empty {}

#[async_trait]
impl ChannelDirectory for HttpSlackApi {
    async fn list_channels(
        &self,
        types: &[&str],
        cursor: Option<&str>,
        limit: u32,
    ) -> ApiResult<ChannelPage> {
        let types = types.join(",");
        let limit = limit.to_string();
        let mut form = vec![
            ("types", types.as_str()),
            ("limit", limit.as_str()),
            ("exclude_archived", "true"),
        ];
        if let Some(cursor) = cursor.filter(|c| !c.is_empty()) {
            form.push(("cursor", cursor));
        }

        let resp: ListResponse = self.call("conversations.list", &form).await?;
        let next_cursor = resp
            .response_metadata
            .map(|m| m.next_cursor)
            .filter(|c| !c.is_empty());
        Ok(ChannelPage {
            channels: resp.channels,
            next_cursor,
        })
    }
}

#[async_trait]
impl SlackApi for HttpSlackApi {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> ApiResult<PostedMessage> {
        let mut form = vec![("channel", channel), ("text", text)];
        if let Some(ts) = thread_ts {
            form.push(("thread_ts", ts));
        }
        self.call("chat.postMessage", &form).await
    }

    async fn history(&self, channel: &str, query: &HistoryQuery) -> ApiResult<HistoryPage> {
        let limit = query.limit.to_string();
        let mut form = vec![("channel", channel), ("limit", limit.as_str())];
        if let Some(oldest) = query.oldest.as_deref() {
            form.push(("oldest", oldest));
        }
        if let Some(latest) = query.latest.as_deref() {
            form.push(("latest", latest));
        }
        self.call("conversations.history", &form).await
    }

    async fn permalink(&self, channel: &str, ts: &str) -> ApiResult<String> {
        let resp: PermalinkResponse = self
            .call("chat.getPermalink", &[("channel", channel), ("message_ts", ts)])
            .await?;
        Ok(resp.permalink)
    }

    async fn user_name(&self, user_id: &str) -> ApiResult<String> {
        let resp: UserInfoResponse = self.call("users.info", &[("user", user_id)]).await?;
        Ok(resp.user.name)
    }

    async fn add_reaction(&self, channel: &str, ts: &str, name: &str) -> ApiResult<()> {
        let _: Empty = self
            .call(
                "reactions.add",
                &[("channel", channel), ("timestamp", ts), ("name", name)],
            )
            .await?;
        Ok(())
    }

    async fn remove_reaction(&self, channel: &str, ts: &str, name: &str) -> ApiResult<()> {
        let _: Empty = self
            .call(
                "reactions.remove",
                &[("channel", channel), ("timestamp", ts), ("name", name)],
            )
            .await?;
        Ok(())
    }
}
