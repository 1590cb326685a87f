use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use slackline_core::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ChannelDirectory, HistoryQuery, RawMessage, SlackApi};
use crate::error::ApiResult;
use crate::resolver::{is_channel_id, ChannelResolver};
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{HistoryMessage, HistoryOptions, HistoryResult, PostResult, ReactionResult};

/// Messages enriched in parallel during a history fetch.
const ENRICH_CONCURRENCY: usize = 8;

/// The six operations the front ends are built on. Every failure comes back
/// as a classified [`slackline_core::AppError`].
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<PostResult>;

    async fn post_thread(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<PostResult>;

    async fn get_history(
        &self,
        channel: &str,
        options: &HistoryOptions,
        cancel: &CancellationToken,
    ) -> Result<HistoryResult>;

    async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        emoji: &str,
        cancel: &CancellationToken,
    ) -> Result<ReactionResult>;

    async fn remove_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        emoji: &str,
        cancel: &CancellationToken,
    ) -> Result<ReactionResult>;

    async fn resolve_channel(&self, channel: &str, cancel: &CancellationToken) -> Result<String>;
}

/// [`Gateway`] over any [`SlackApi`] implementation.
pub struct SlackGateway<A: SlackApi + 'static> {
    api: Arc<A>,
    resolver: ChannelResolver,
    policy: RetryPolicy,
}

impl<A: SlackApi + 'static> SlackGateway<A> {
    pub fn new(api: A) -> Self {
        Self::with_policy(Arc::new(api), RetryPolicy::default())
    }

    pub fn with_policy(api: Arc<A>, policy: RetryPolicy) -> Self {
        let directory: Arc<dyn ChannelDirectory> = api.clone();
        Self {
            resolver: ChannelResolver::new(directory, policy),
            api,
            policy,
        }
    }

    pub fn resolver(&self) -> &ChannelResolver {
        &self.resolver
    }

    /// Bare name when addressed by name, cached name (or empty) when addressed by ID.
    fn channel_name(&self, reference: &str, id: &str) -> String {
        if is_channel_id(reference) {
            self.resolver.cache().name_for(id).unwrap_or_default()
        } else {
            reference.strip_prefix('#').unwrap_or(reference).to_string()
        }
    }

    async fn post(
        &self,
        channel: &str,
        thread_ts: Option<&str>,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<PostResult> {
        let id = self.resolver.resolve(channel, cancel).await?;
        debug!(channel = %id, threaded = thread_ts.is_some(), "posting message");

        let posted = with_retry(&self.policy, cancel, || {
            self.api.post_message(&id, text, thread_ts)
        })
        .await?;

        let permalink = best_effort(cancel, "chat.getPermalink", self.api.permalink(&id, &posted.ts))
            .await
            .unwrap_or_default();

        Ok(PostResult {
            channel_name: self.channel_name(channel, &id),
            channel: id,
            ts: posted.ts,
            thread_ts: thread_ts.map(str::to_string),
            message: text.to_string(),
            permalink,
        })
    }

    async fn enrich(
        &self,
        channel_id: &str,
        raw: RawMessage,
        cancel: &CancellationToken,
    ) -> HistoryMessage {
        let user_name = if raw.user.is_empty() {
            None
        } else {
            best_effort(cancel, "users.info", self.api.user_name(&raw.user)).await
        };
        let permalink =
            best_effort(cancel, "chat.getPermalink", self.api.permalink(channel_id, &raw.ts)).await;

        HistoryMessage {
            user_name: user_name.unwrap_or_default(),
            permalink: permalink.unwrap_or_default(),
            user: raw.user,
            text: raw.text,
            ts: raw.ts,
            thread_ts: raw.thread_ts,
            reply_count: raw.reply_count,
        }
    }

    async fn react(
        &self,
        channel: &str,
        timestamp: &str,
        emoji: &str,
        remove: bool,
        cancel: &CancellationToken,
    ) -> Result<ReactionResult> {
        let id = self.resolver.resolve(channel, cancel).await?;
        debug!(channel = %id, timestamp, emoji, remove, "updating reaction");

        with_retry(&self.policy, cancel, || {
            if remove {
                self.api.remove_reaction(&id, timestamp, emoji)
            } else {
                self.api.add_reaction(&id, timestamp, emoji)
            }
        })
        .await?;

        Ok(ReactionResult {
            channel_name: self.channel_name(channel, &id),
            channel: id,
            timestamp: timestamp.to_string(),
            reaction: emoji.to_string(),
        })
    }
}

/// Await an enrichment call, logging and dropping any failure.
/// Cancellation also yields `None`; the primary operation already succeeded.
async fn best_effort<T>(
    cancel: &CancellationToken,
    what: &str,
    call: impl Future<Output = ApiResult<T>>,
) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = call => match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(call = what, error = %e, "enrichment lookup failed");
                None
            }
        },
    }
}

#[async_trait]
impl<A: SlackApi + 'static> Gateway for SlackGateway<A> {
    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<PostResult> {
        self.post(channel, None, text, cancel).await
    }

    async fn post_thread(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<PostResult> {
        self.post(channel, Some(thread_ts), text, cancel).await
    }

    async fn get_history(
        &self,
        channel: &str,
        options: &HistoryOptions,
        cancel: &CancellationToken,
    ) -> Result<HistoryResult> {
        let id = self.resolver.resolve(channel, cancel).await?;
        let query = HistoryQuery {
            limit: options.effective_limit(),
            oldest: options.oldest.clone().filter(|s| !s.is_empty()),
            latest: options.latest.clone().filter(|s| !s.is_empty()),
        };
        debug!(channel = %id, limit = query.limit, "fetching history");

        let page = with_retry(&self.policy, cancel, || self.api.history(&id, &query)).await?;

        let mut messages: Vec<HistoryMessage> = Vec::with_capacity(page.messages.len());
        for batch in page.messages.chunks(ENRICH_CONCURRENCY) {
            let enriched = join_all(
                batch
                    .iter()
                    .cloned()
                    .map(|raw| self.enrich(&id, raw, cancel)),
            )
            .await;
            messages.extend(enriched);
        }

        Ok(HistoryResult {
            channel_name: self.channel_name(channel, &id),
            channel: id,
            count: messages.len(),
            has_more: page.has_more,
            messages,
        })
    }

    async fn add_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        emoji: &str,
        cancel: &CancellationToken,
    ) -> Result<ReactionResult> {
        self.react(channel, timestamp, emoji, false, cancel).await
    }

    async fn remove_reaction(
        &self,
        channel: &str,
        timestamp: &str,
        emoji: &str,
        cancel: &CancellationToken,
    ) -> Result<ReactionResult> {
        self.react(channel, timestamp, emoji, true, cancel).await
    }

    async fn resolve_channel(&self, channel: &str, cancel: &CancellationToken) -> Result<String> {
        self.resolver.resolve(channel, cancel).await
    }
}
