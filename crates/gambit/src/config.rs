//! Server configuration, read from `GAMBIT_*` environment variables.

use std::str::FromStr;
use std::time::Duration;

use gambit_transport::DEFAULT_HEALTH_PATH;
use serde::{Deserialize, Serialize};

/// Process-level settings for the session server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Plain-HTTP liveness route served on the WebSocket port.
    pub health_path: String,

    /// A connection that sends nothing (not even a heartbeat) for this
    /// long is closed and treated as a disconnect.
    pub idle_timeout: Duration,

    /// Connections beyond this many are refused a session.
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            idle_timeout: Duration::from_secs(30),
            max_sessions: 1024,
        }
    }
}

impl ServerConfig {
    /// Reads `GAMBIT_HOST`, `GAMBIT_PORT`, `GAMBIT_HEALTH_PATH`,
    /// `GAMBIT_IDLE_TIMEOUT_SECS` and `GAMBIT_MAX_SESSIONS`. Unset or
    /// malformed values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let config = Self {
            host: non_empty(&lookup, "GAMBIT_HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "GAMBIT_PORT").unwrap_or(defaults.port),
            health_path: non_empty(&lookup, "GAMBIT_HEALTH_PATH")
                .filter(|p| p.starts_with('/'))
                .unwrap_or(defaults.health_path),
            idle_timeout: parsed::<u64>(&lookup, "GAMBIT_IDLE_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
            max_sessions: parsed::<usize>(&lookup, "GAMBIT_MAX_SESSIONS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_sessions),
        };
        tracing::debug!(?config, "configuration loaded");
        config
    }

    /// `host:port`, ready for [`WebSocketTransport::bind`](gambit_transport::WebSocketTransport::bind).
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = non_empty(lookup, key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring malformed setting");
            None
        }
    }
}
