//! Tool dispatch for slackline.
//!
//! Each operation is a [`Tool`]: it validates its named parameters, resolves
//! the effective channel from the [`Config`], tags outgoing text, calls the
//! [`Gateway`], and returns either a success map (`{"ok": true, ...}`) or a
//! classified [`slackline_core::AppError`]. Both the CLI and the stdio server
//! go through [`ToolRegistry::dispatch`].

pub mod envelope;
pub mod history;
pub mod post;
pub mod reaction;
pub mod registry;
pub mod tag;

mod params;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slackline_core::{Config, Result};
use slackline_slack::Gateway;
use tokio_util::sync::CancellationToken;

pub use registry::ToolRegistry;
pub use tag::{append_display_name_tag, normalize_emoji};

/// Text result handed to a tool-calling client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// Everything a handler needs besides its parameters.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    pub gateway: &'a dyn Gateway,
    pub config: &'a Config,
    pub cancel: &'a CancellationToken,
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Wire name, e.g. `slack_post_message`.
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the parameter bag.
    fn input_schema(&self) -> Value;
    /// Run the operation. `Ok` carries the success envelope.
    async fn execute(&self, ctx: ToolContext<'_>, params: &Value) -> Result<Value>;
}
