use thiserror::Error;

#[derive(Error, Debug)]
pub enum CauserieError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Authentication failures. Surfaced to the embedder as redirect-to-login.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No auth token available")]
    MissingToken,

    #[error("Unauthorized")]
    Unauthorized,
}

/// Transport failures. Surfaced as the disconnected/reconnecting indicator,
/// never as a fatal error.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    #[error("Connection failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("No active session")]
    NotConnected,

    #[error("Session task is gone")]
    ChannelClosed,
}

/// HTTP collaborator failures. Surfaced as an inline banner.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Request failed: {0}")]
    Http(String),

    #[error("Server responded {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response body: {0}")]
    Decode(String),
}

/// Wire frame decode failures. Logged and skipped by the session loop.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unknown event name: {0}")]
    UnknownEvent(String),

    #[error("Frame missing field: {0}")]
    MissingField(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, CauserieError>;
