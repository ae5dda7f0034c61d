//! Client configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the client can run with zero
//! configuration against a local backend.

use std::time::Duration;

use causerie_shared::constants::{
    DEFAULT_BACKEND_URL, RECONNECT_ATTEMPTS, RECONNECT_DELAY_MS, TYPING_IDLE_MS,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL (HTTP; the WebSocket endpoint is derived from it).
    /// Env: `BACKEND_API_URL`
    /// Default: `http://localhost:5000`
    pub backend_url: String,

    /// Connection attempts per dial before giving up.
    /// Env: `RECONNECT_ATTEMPTS`
    /// Default: `5`
    pub reconnect_attempts: u32,

    /// Fixed delay between connection attempts.
    /// Env: `RECONNECT_DELAY_MS`
    /// Default: `1000`
    pub reconnect_delay: Duration,

    /// Inactivity window after which a typing:stop is emitted.
    /// Env: `TYPING_IDLE_MS`
    /// Default: `2000`
    pub typing_idle: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            backend_url: std::env::var("BACKEND_API_URL").unwrap_or(defaults.backend_url),
            reconnect_attempts: env_parse("RECONNECT_ATTEMPTS", defaults.reconnect_attempts),
            reconnect_delay: Duration::from_millis(env_parse(
                "RECONNECT_DELAY_MS",
                defaults.reconnect_delay.as_millis() as u64,
            )),
            typing_idle: Duration::from_millis(env_parse(
                "TYPING_IDLE_MS",
                defaults.typing_idle.as_millis() as u64,
            )),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            reconnect_attempts: RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            typing_idle: Duration::from_millis(TYPING_IDLE_MS),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
