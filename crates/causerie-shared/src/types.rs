use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// User identifier issued by the backend (opaque string, never minted here)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Deterministic identifier for a two-party conversation.
///
/// The two participant ids are sorted lexicographically and joined with
/// `-`, so both sides derive the same key regardless of which of them is
/// the current user: `between(a, b) == between(b, a)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn between(a: &UserId, b: &UserId) -> Self {
        let (lo, hi) = if a.as_str() <= b.as_str() {
            (a, b)
        } else {
            (b, a)
        };
        Self(format!("{lo}-{hi}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Online,
    Offline,
}

/// Delivery status as reported by the backend.
///
/// Only `Sending` is ever assigned locally (optimistic placeholder); every
/// other value arrives on the wire and is carried through untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    Failed,
    Error,
}

/// A contact as returned by the backend roster listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Backend-issued identifier.
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    pub email: String,
    /// Avatar reference (URL or backend blob key).
    pub avatar: String,
    pub status: Presence,
    /// Last time the user was seen online, if the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// A single chat message between two users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: String,
    pub content: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub status: MessageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
}

impl Message {
    /// Build a local optimistic placeholder in the `Sending` state.
    ///
    /// The id is a fresh UUID; the backend replaces it with its own id in
    /// the `message:sent` echo.
    pub fn outgoing(sender_id: UserId, receiver_id: UserId, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            sender_id,
            receiver_id,
            timestamp: Utc::now(),
            status: MessageStatus::Sending,
            read: None,
        }
    }

    /// The conversation this message belongs to.
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::between(&self.sender_id, &self.receiver_id)
    }
}
