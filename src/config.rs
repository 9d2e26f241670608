//! Client and relay configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RELAY_PORT: u16 = 3000;
pub const DEFAULT_ROOM_MESSAGE_CAP: usize = 1000;
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

impl HttpTimeouts {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            request_secs: env_parse("CHAT_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("CHAT_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Origin of the chat relay, without trailing slash. Empty means
    /// "same origin", which only resolves inside a browser; native callers
    /// must set it.
    pub api_base_url: String,
    pub polling_interval: Duration,
    pub timeouts: HttpTimeouts,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            polling_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeouts: HttpTimeouts::default(),
        }
    }
}

impl ClientConfig {
    /// Config with defaults and the given relay origin.
    #[must_use]
    pub fn with_base_url(api_base_url: &str) -> Self {
        Self { api_base_url: normalize_base_url(api_base_url), ..Self::default() }
    }

    /// Build client config from environment variables.
    ///
    /// Optional:
    /// - `CHAT_API_BASE_URL`: relay origin (default empty)
    /// - `CHAT_POLL_INTERVAL_MS`: default 3000, must be non-zero
    /// - `CHAT_REQUEST_TIMEOUT_SECS`: default 30
    /// - `CHAT_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if the poll interval is zero or not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = normalize_base_url(&std::env::var("CHAT_API_BASE_URL").unwrap_or_default());
        let interval_ms = parse_poll_interval(std::env::var("CHAT_POLL_INTERVAL_MS").ok().as_deref())?;
        Ok(Self {
            api_base_url,
            polling_interval: Duration::from_millis(interval_ms),
            timeouts: HttpTimeouts::from_env(),
        })
    }
}

pub(crate) fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

pub fn parse_poll_interval(raw: Option<&str>) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_POLL_INTERVAL_MS);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid { var: "CHAT_POLL_INTERVAL_MS", reason: "must be greater than zero".into() }),
        Ok(ms) => Ok(ms),
        Err(e) => Err(ConfigError::Invalid { var: "CHAT_POLL_INTERVAL_MS", reason: e.to_string() }),
    }
}

// =============================================================================
// RELAY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub port: u16,
    /// Messages retained per room; older ones are dropped first.
    pub room_message_cap: usize,
    /// Page size for history requests that omit `limit`.
    pub default_history_limit: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_RELAY_PORT,
            room_message_cap: DEFAULT_ROOM_MESSAGE_CAP,
            default_history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl RelayConfig {
    /// - `PORT`: default 3000
    /// - `RELAY_ROOM_MESSAGE_CAP`: default 1000
    /// - `RELAY_DEFAULT_HISTORY_LIMIT`: default 50
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_RELAY_PORT),
            room_message_cap: env_parse("RELAY_ROOM_MESSAGE_CAP", DEFAULT_ROOM_MESSAGE_CAP).max(1),
            default_history_limit: env_parse("RELAY_DEFAULT_HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT),
        }
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
