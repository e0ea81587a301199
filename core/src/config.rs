//! Transport session configuration.
//!
//! Values can come from serde (any format the caller likes) or from the
//! process environment via [`TransportConfig::from_env`].

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

pub const ENV_TIMEOUT_SECS: &str = "HTTP_REQUEST_TIMEOUT_SECS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "HTTP_REQUEST_CONNECT_TIMEOUT_SECS";
pub const ENV_USER_AGENT: &str = "HTTP_REQUEST_USER_AGENT";
pub const ENV_FOLLOW_REDIRECTS: &str = "HTTP_REQUEST_FOLLOW_REDIRECTS";

const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Settings for the shared session owned by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Whole-request timeout in seconds. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    /// Sent with every request unless the request sets the same header.
    pub default_headers: Vec<(String, String)>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            connect_timeout_secs: None,
            user_agent: None,
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            default_headers: Vec::new(),
        }
    }
}

impl TransportConfig {
    /// Read overrides from `HTTP_REQUEST_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, with a custom variable source. Unparsable values are
    /// logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(secs) = parse_var(&lookup, ENV_TIMEOUT_SECS) {
            config.timeout_secs = Some(secs);
        }
        if let Some(secs) = parse_var(&lookup, ENV_CONNECT_TIMEOUT_SECS) {
            config.connect_timeout_secs = Some(secs);
        }
        if let Some(agent) = lookup(ENV_USER_AGENT).filter(|agent| !agent.is_empty()) {
            config.user_agent = Some(agent);
        }
        if let Some(follow) = parse_var(&lookup, ENV_FOLLOW_REDIRECTS) {
            config.follow_redirects = follow;
        }
        config
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable configuration value");
            None
        }
    }
}
