//! Slack side of slackline: the HTTP collaborator, the channel resolver with
//! its name cache, the rate-limit retry controller, and the [`Gateway`] that
//! composes them into the six public operations.

pub mod api;
pub mod error;
pub mod gateway;
pub mod resolver;
pub mod retry;
pub mod types;

pub use api::{ChannelDirectory, ChannelEntry, ChannelPage, HttpSlackApi, SlackApi};
pub use error::SlackApiError;
pub use gateway::{Gateway, SlackGateway};
pub use resolver::{is_channel_id, ChannelCache, ChannelResolver};
pub use retry::{with_retry, RetryPolicy};
pub use types::{HistoryMessage, HistoryOptions, HistoryResult, PostResult, ReactionResult};
