use std::sync::{Arc, LazyLock};

use dashmap::DashMap;
use regex::Regex;
use slackline_core::{AppError, ErrorCode, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::ChannelDirectory;
use crate::retry::{with_retry, RetryPolicy};

/// Channels requested per directory page.
pub const PAGE_SIZE: u32 = 200;
/// Directory pages scanned before giving up on a name.
pub const MAX_PAGES: usize = 5;

const ALL_TYPES: &[&str] = &["public_channel", "private_channel"];
const PUBLIC_ONLY: &[&str] = &["public_channel"];

static CHANNEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[CGD][A-Z0-9]{8,}$").expect("valid channel id regex"));

/// True for canonical IDs (`C…` public, `G…` private/group, `D…` direct).
pub fn is_channel_id(s: &str) -> bool {
    CHANNEL_ID.is_match(s)
}

/// Process-lifetime name → ID map. No TTL, no eviction.
#[derive(Debug, Default)]
pub struct ChannelCache {
    ids: DashMap<String, String>,
}

impl ChannelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.ids.get(name).map(|id| id.value().clone())
    }

    pub fn insert(&self, name: impl Into<String>, id: impl Into<String>) {
        self.ids.insert(name.into(), id.into());
    }

    /// Reverse lookup used to label results addressed by ID.
    pub fn name_for(&self, id: &str) -> Option<String> {
        self.ids
            .iter()
            .find(|entry| entry.value() == id)
            .map(|entry| entry.key().clone())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Turns `C0123…`, `#general` or `general` into a canonical channel ID.
pub struct ChannelResolver {
    directory: Arc<dyn ChannelDirectory>,
    cache: ChannelCache,
    policy: RetryPolicy,
}

impl ChannelResolver {
    pub fn new(directory: Arc<dyn ChannelDirectory>, policy: RetryPolicy) -> Self {
        Self {
            directory,
            cache: ChannelCache::new(),
            policy,
        }
    }

    pub fn cache(&self) -> &ChannelCache {
        &self.cache
    }

    pub async fn resolve(&self, reference: &str, cancel: &CancellationToken) -> Result<String> {
        if is_channel_id(reference) {
            return Ok(reference.to_string());
        }

        let name = reference.strip_prefix('#').unwrap_or(reference);
        if name.is_empty() {
            return Err(AppError::new(ErrorCode::ChannelNotFound, "channel name is empty"));
        }

        if let Some(id) = self.cache.get(name) {
            debug!(name, id = %id, "channel cache hit");
            return Ok(id);
        }

        let id = match self.search(name, ALL_TYPES, cancel).await {
            Err(e) if e.code == ErrorCode::MissingScope => {
                warn!(name, "no scope for private channels, searching public channels only");
                self.search(name, PUBLIC_ONLY, cancel).await?
            }
            other => other?,
        };

        info!(name, id = %id, "channel resolved");
        self.cache.insert(name, id.clone());
        Ok(id)
    }

    async fn search(
        &self,
        name: &str,
        types: &[&str],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let directory = &*self.directory;
        let mut cursor: Option<String> = None;

        for page in 0..MAX_PAGES {
            let current = cursor.as_deref();
            let listing = with_retry(&self.policy, cancel, move || {
                directory.list_channels(types, current, PAGE_SIZE)
            })
            .await?;

            debug!(name, page, channels = listing.channels.len(), "scanned directory page");

            if let Some(found) = listing.channels.into_iter().find(|c| c.name == name) {
                return Ok(found.id);
            }

            match listing.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Err(AppError::new(
            ErrorCode::ChannelNotFound,
            format!("channel not found: {name}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChannelEntry, ChannelPage};
    use crate::error::{ApiResult, SlackApiError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves `pages` in order; page N's cursor is `"pN"`.
    #[derive(Default)]
    struct FakeDirectory {
        pages: Vec<Vec<(&'static str, &'static str)>>,
        /// Reject the private type-set with `missing_scope`.
        no_private_scope: bool,
        /// Keep handing out cursors forever.
        endless: bool,
        /// Fail this many calls with a rate limit first.
        rate_limits: AtomicUsize,
        fail_with: Option<&'static str>,
        calls: AtomicUsize,
        seen_types: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChannelDirectory for FakeDirectory {
        async fn list_channels(
            &self,
            types: &[&str],
            cursor: Option<&str>,
            _limit: u32,
        ) -> ApiResult<ChannelPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_types.lock().unwrap().push(types.join(","));

            if self.rate_limits.load(Ordering::SeqCst) > 0 {
                self.rate_limits.fetch_sub(1, Ordering::SeqCst);
                return Err(SlackApiError::RateLimited { retry_after: None });
            }
            if let Some(symbol) = self.fail_with {
                return Err(SlackApiError::Api(symbol.into()));
            }
            if self.no_private_scope && types.contains(&"private_channel") {
                return Err(SlackApiError::Api("missing_scope".into()));
            }

            let index = cursor
                .and_then(|c| c.trim_start_matches('p').parse::<usize>().ok())
                .unwrap_or(0);
            if self.endless {
                return Ok(ChannelPage {
                    channels: vec![],
                    next_cursor: Some(format!("p{}", index + 1)),
                });
            }

            let channels = self
                .pages
                .get(index)
                .map(|page| {
                    page.iter()
                        .map(|(id, name)| ChannelEntry {
                            id: id.to_string(),
                            name: name.to_string(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            let next_cursor = (index + 1 < self.pages.len()).then(|| format!("p{}", index + 1));
            Ok(ChannelPage {
                channels,
                next_cursor,
            })
        }
    }

    fn resolver(dir: &Arc<FakeDirectory>) -> ChannelResolver {
        ChannelResolver::new(dir.clone(), RetryPolicy::default())
    }

    #[test]
    fn channel_id_pattern() {
        assert!(is_channel_id("C0123456789"));
        assert!(is_channel_id("G12345678"));
        assert!(is_channel_id("D0ABCDEFG"));
        assert!(!is_channel_id("C1234567"));
        assert!(!is_channel_id("general"));
        assert!(!is_channel_id("c0123456789"));
        assert!(!is_channel_id("X0123456789"));
    }

    #[tokio::test]
    async fn ids_skip_the_directory() {
        let dir = Arc::new(FakeDirectory::default());
        let id = resolver(&dir)
            .resolve("C0123456789", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(id, "C0123456789");
        assert_eq!(dir.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn names_are_cached_after_first_lookup() {
        let dir = Arc::new(FakeDirectory {
            pages: vec![vec![("C111111111", "random"), ("C222222222", "general")]],
            ..Default::default()
        });
        let resolver = resolver(&dir);
        let cancel = CancellationToken::new();

        assert_eq!(resolver.resolve("#general", &cancel).await.unwrap(), "C222222222");
        assert_eq!(resolver.resolve("general", &cancel).await.unwrap(), "C222222222");
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cache().name_for("C222222222").as_deref(), Some("general"));
    }

    #[tokio::test]
    async fn exact_name_match_only() {
        let dir = Arc::new(FakeDirectory {
            pages: vec![vec![("C111111111", "general-2"), ("C222222222", "gen")]],
            ..Default::default()
        });
        let err = resolver(&dir)
            .resolve("general", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ChannelNotFound);
    }

    #[tokio::test]
    async fn follows_cursor_to_later_pages() {
        let dir = Arc::new(FakeDirectory {
            pages: vec![
                vec![("C111111111", "alpha")],
                vec![("C222222222", "beta")],
                vec![("C333333333", "gamma")],
            ],
            ..Default::default()
        });
        let id = resolver(&dir)
            .resolve("gamma", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(id, "C333333333");
        assert_eq!(dir.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn search_is_bounded() {
        let dir = Arc::new(FakeDirectory {
            endless: true,
            ..Default::default()
        });
        let err = resolver(&dir)
            .resolve("nowhere", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ChannelNotFound);
        assert_eq!(dir.calls.load(Ordering::SeqCst), MAX_PAGES);
    }

    #[tokio::test]
    async fn missing_scope_falls_back_to_public() {
        let dir = Arc::new(FakeDirectory {
            pages: vec![vec![("C222222222", "general")]],
            no_private_scope: true,
            ..Default::default()
        });
        let id = resolver(&dir)
            .resolve("general", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(id, "C222222222");
        assert_eq!(
            *dir.seen_types.lock().unwrap(),
            vec!["public_channel,private_channel", "public_channel"]
        );
    }

    #[tokio::test]
    async fn other_failures_do_not_fall_back() {
        let dir = Arc::new(FakeDirectory {
            fail_with: Some("invalid_auth"),
            ..Default::default()
        });
        let resolver = resolver(&dir);
        let err = resolver
            .resolve("general", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAuth);
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_pages_are_retried() {
        let dir = Arc::new(FakeDirectory {
            pages: vec![vec![("C222222222", "general")]],
            rate_limits: AtomicUsize::new(2),
            ..Default::default()
        });
        let id = resolver(&dir)
            .resolve("general", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(id, "C222222222");
        assert_eq!(dir.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_name_is_not_searched() {
        let dir = Arc::new(FakeDirectory::default());
        let err = resolver(&dir)
            .resolve("#", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ChannelNotFound);
        assert_eq!(dir.calls.load(Ordering::SeqCst), 0);
    }
}
