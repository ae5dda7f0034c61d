/// Application name
pub const APP_NAME: &str = "Causerie";

/// WebSocket endpoint path on the backend
pub const WS_PATH: &str = "/ws";

/// Default backend base URL for local development
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Maximum connection attempts before giving up (initial dial and re-dial)
pub const RECONNECT_ATTEMPTS: u32 = 5;

/// Fixed delay between connection attempts in milliseconds
pub const RECONNECT_DELAY_MS: u64 = 1000;

/// Typing inactivity window in milliseconds: a typing:stop is emitted after
/// this long without a keystroke
pub const TYPING_IDLE_MS: u64 = 2000;

/// How long a publish waits for a remote acknowledgement before resolving
/// without one
pub const ACK_TIMEOUT_MS: u64 = 5000;

/// Capacity of the session command and notification channels
pub const SESSION_CHANNEL_CAPACITY: usize = 256;
