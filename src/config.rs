//! Client configuration.
//!
//! [`ClientConfig`] can be built in code, parsed from TOML, or read from
//! `AILOOP_*` environment variables.
//!
//! ```toml
//! server_url = "http://localhost:8080"
//! channel = "public"
//! timeout_ms = 30000
//! reconnect_attempts = 5
//! reconnect_delay_ms = 1000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Environment variable overriding [`ClientConfig::server_url`].
pub const ENV_SERVER_URL: &str = "AILOOP_SERVER_URL";
/// Environment variable overriding [`ClientConfig::channel`].
pub const ENV_CHANNEL: &str = "AILOOP_CHANNEL";
/// Environment variable overriding [`ClientConfig::timeout_ms`].
pub const ENV_TIMEOUT_MS: &str = "AILOOP_TIMEOUT_MS";
/// Environment variable overriding [`ClientConfig::reconnect_attempts`].
pub const ENV_RECONNECT_ATTEMPTS: &str = "AILOOP_RECONNECT_ATTEMPTS";
/// Environment variable overriding [`ClientConfig::reconnect_delay_ms`].
pub const ENV_RECONNECT_DELAY_MS: &str = "AILOOP_RECONNECT_DELAY_MS";

/// Settings for [`AiloopClient`](crate::AiloopClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the ailoop server.
    pub server_url: String,
    /// Channel used when a call does not name one.
    pub channel: String,
    /// Per-request HTTP timeout in milliseconds.
    pub timeout_ms: u64,
    /// How many times the WebSocket reconnects before giving up.
    pub reconnect_attempts: u32,
    /// Base reconnect delay in milliseconds, doubled on each attempt.
    pub reconnect_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8080".to_string(),
            channel: "public".to_string(),
            timeout_ms: 30_000,
            reconnect_attempts: 5,
            reconnect_delay_ms: 1_000,
        }
    }
}

impl ClientConfig {
    /// Defaults pointed at `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::default().with_server_url(server_url)
    }

    /// Parse configuration from a TOML string. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::validation(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::validation(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Defaults overridden by `AILOOP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env(std::env::vars())
    }

    /// Override fields from `AILOOP_*` entries in `vars`.
    ///
    /// Unrelated entries are ignored. A numeric variable that does not parse
    /// is a validation error naming the variable.
    pub fn merge_env<I, K, V>(mut self, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let key = key.as_ref();
            match key {
                ENV_SERVER_URL => self.server_url = value.into(),
                ENV_CHANNEL => self.channel = value.into(),
                ENV_TIMEOUT_MS => self.timeout_ms = parse_env(key, value.into())?,
                ENV_RECONNECT_ATTEMPTS => self.reconnect_attempts = parse_env(key, value.into())?,
                ENV_RECONNECT_DELAY_MS => self.reconnect_delay_ms = parse_env(key, value.into())?,
                _ => {},
            }
        }
        self.validate()?;
        Ok(self)
    }

    /// Serialize the configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::validation(format!("cannot serialize configuration: {e}")))
    }

    /// Reject an unusable server URL or an empty default channel.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        if self.channel.is_empty() {
            return Err(Error::validation("default channel must not be empty"));
        }
        Ok(())
    }

    /// The server URL, parsed. Only `http` and `https` are accepted.
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.server_url).map_err(|e| {
            Error::validation(format!("invalid server url `{}`: {e}", self.server_url))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(Error::validation(format!(
                "server url `{}` must use http or https, not {other}",
                self.server_url
            ))),
        }
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Base reconnect delay.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Set the server URL.
    pub fn with_server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    /// Set the default channel.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the number of reconnect attempts.
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Set the base reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::validation(format!("{key}=`{value}` is not a valid number: {e}")))
}
