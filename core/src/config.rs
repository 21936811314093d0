//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object deserializes to
//! `SpiderConfig::default()` and hosts can embed the struct in their own
//! configuration files.

use serde::Deserialize;

pub const DEFAULT_USER_AGENT: &str = concat!("spider/", env!("CARGO_PKG_VERSION"));

/// Default cap on a response body, in bytes.
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SpiderConfig {
    /// Sent as `user-agent` unless the request sets its own.
    pub user_agent: String,
    /// Bodies larger than this fail with a transport error.
    pub max_response_bytes: u64,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}
