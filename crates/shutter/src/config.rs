//! Client configuration.

use crate::error::{RelayError, RelayResult};
use std::time::Duration;
use url::Url;

/// Default endpoint, matching the watcher's default host, port and path.
pub const DEFAULT_URL: &str = "ws://localhost:8000/images";

/// Relay client configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// WebSocket endpoint (ws:// or wss://).
    pub url: String,
    /// Bearer token sent in the upgrade request. `None` connects unauthenticated.
    pub api_key: Option<String>,
    /// Backoff unit; the n-th consecutive failure waits `n * reconnect_interval`.
    pub reconnect_interval: Duration,
    /// Upper bound on a single backoff wait.
    pub reconnect_cap: Duration,
    /// Consecutive failed attempts before giving up permanently.
    pub max_reconnect_attempts: u32,
    /// How long the sender waits on an empty queue before re-checking for shutdown.
    pub dequeue_timeout: Duration,
    /// Sender pause after re-queueing a message while disconnected.
    pub disconnected_pause: Duration,
    /// Budget for `close()` before tasks are aborted.
    pub shutdown_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            api_key: None,
            reconnect_interval: Duration::from_secs(5),
            reconnect_cap: Duration::from_secs(60),
            max_reconnect_attempts: 10,
            dequeue_timeout: Duration::from_secs(1),
            disconnected_pause: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl RelayConfig {
    /// Create a configuration for `url` with default timings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Build a `ws://host:port/path` endpoint URL.
    pub fn endpoint_url(host: &str, port: u16, path: &str) -> RelayResult<String> {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        let url = Url::parse(&format!("ws://{}:{}{}", host, port, path))
            .map_err(|e| RelayError::InvalidConfig(format!("invalid endpoint: {}", e)))?;
        Ok(url.to_string())
    }

    /// Check the configuration before starting a client.
    pub fn validate(&self) -> RelayResult<()> {
        let url = Url::parse(&self.url)
            .map_err(|e| RelayError::InvalidConfig(format!("invalid url {:?}: {}", self.url, e)))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RelayError::InvalidConfig(format!(
                "url scheme must be ws or wss, got {}",
                url.scheme()
            )));
        }

        if self.max_reconnect_attempts == 0 {
            return Err(RelayError::InvalidConfig(
                "max_reconnect_attempts must be at least 1".to_string(),
            ));
        }

        if self.dequeue_timeout.is_zero() {
            return Err(RelayError::InvalidConfig(
                "dequeue_timeout must be non-zero".to_string(),
            ));
        }

        if matches!(&self.api_key, Some(key) if key.trim().is_empty()) {
            return Err(RelayError::InvalidConfig("api_key is empty".to_string()));
        }

        Ok(())
    }
}
