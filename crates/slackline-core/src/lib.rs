//! Shared foundations for slackline: the error taxonomy every failure is
//! funnelled through, and the read-only [`config::Config`] consumed by the
//! gateway and both front ends.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{classify, mask_token, AppError, ErrorCode, Result};
