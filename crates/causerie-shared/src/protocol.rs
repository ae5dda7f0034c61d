//! Wire protocol for the real-time session.
//!
//! The vocabulary of events is closed: every name the backend may send or
//! the client may emit has a variant here, and frame decoding dispatches on
//! an exhaustive match so a new event cannot be added without the compiler
//! pointing at every consumer.
//!
//! Frames are JSON text messages:
//!
//! - server event: `{"event": "<name>", "data": <payload>}`
//! - client event: `{"seq": <n>, "event": "<name>", "data": <payload>}`
//! - acknowledgement: `{"ack": <seq>, "data": <payload>}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::{Message, UserId};

/// Subscription key for the event bus, one variant per wire event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessageNew,
    MessageSent,
    UsersOnline,
    UserOnline,
    UserOffline,
    TypingStart,
    TypingStop,
}

impl EventKind {
    pub fn wire_name(&self) -> &'static str {
        match self {
            EventKind::MessageNew => "message:new",
            EventKind::MessageSent => "message:sent",
            EventKind::UsersOnline => "users:online",
            EventKind::UserOnline => "user:online",
            EventKind::UserOffline => "user:offline",
            EventKind::TypingStart => "typing:start",
            EventKind::TypingStop => "typing:stop",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        match name {
            "message:new" => Some(EventKind::MessageNew),
            "message:sent" => Some(EventKind::MessageSent),
            "users:online" => Some(EventKind::UsersOnline),
            "user:online" => Some(EventKind::UserOnline),
            "user:offline" => Some(EventKind::UserOffline),
            "typing:start" => Some(EventKind::TypingStart),
            "typing:stop" => Some(EventKind::TypingStop),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

/// Payload of `user:online` / `user:offline` and inbound `typing:*` events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: UserId,
}

/// An event received from the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// A message from a peer addressed to the current user.
    MessageNew(Message),
    /// Echo of a message the current user sent, as stored by the backend.
    MessageSent(Message),
    /// Snapshot of every currently-online user id.
    UsersOnline(Vec<UserId>),
    UserOnline(UserRef),
    UserOffline(UserRef),
    TypingStart(UserRef),
    TypingStop(UserRef),
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::MessageNew(_) => EventKind::MessageNew,
            ServerEvent::MessageSent(_) => EventKind::MessageSent,
            ServerEvent::UsersOnline(_) => EventKind::UsersOnline,
            ServerEvent::UserOnline(_) => EventKind::UserOnline,
            ServerEvent::UserOffline(_) => EventKind::UserOffline,
            ServerEvent::TypingStart(_) => EventKind::TypingStart,
            ServerEvent::TypingStop(_) => EventKind::TypingStop,
        }
    }
}

/// An event the client emits toward the backend.
///
/// Message sends go over HTTP, not the socket, so the outbound vocabulary
/// is the typing pair only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    TypingStart { receiver_id: UserId },
    TypingStop { receiver_id: UserId },
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::TypingStart { .. } => EventKind::TypingStart,
            ClientEvent::TypingStop { .. } => EventKind::TypingStop,
        }
    }

    fn payload(&self) -> Value {
        match self {
            ClientEvent::TypingStart { receiver_id } | ClientEvent::TypingStop { receiver_id } => {
                serde_json::json!({ "receiverId": receiver_id })
            }
        }
    }
}

/// An outbound frame carrying a client event and its sequence number.
///
/// The sequence number keys the acknowledgement, if the backend sends one.
#[derive(Debug, Clone)]
pub struct ClientFrame {
    pub seq: u64,
    pub event: ClientEvent,
}

impl ClientFrame {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let frame = serde_json::json!({
            "seq": self.seq,
            "event": self.event.kind().wire_name(),
            "data": self.event.payload(),
        });
        Ok(serde_json::to_string(&frame)?)
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    Event(ServerEvent),
    Ack { seq: u64, data: Value },
}

impl ServerFrame {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;

        if let Some(seq) = value.get("ack").and_then(Value::as_u64) {
            let data = value.get("data").cloned().unwrap_or(Value::Null);
            return Ok(ServerFrame::Ack { seq, data });
        }

        let name = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingField("event"))?;

        let kind = EventKind::from_wire_name(name)
            .ok_or_else(|| ProtocolError::UnknownEvent(name.to_string()))?;

        let data = value.get("data").cloned().unwrap_or(Value::Null);

        let event = match kind {
            EventKind::MessageNew => ServerEvent::MessageNew(serde_json::from_value(data)?),
            EventKind::MessageSent => ServerEvent::MessageSent(serde_json::from_value(data)?),
            EventKind::UsersOnline => ServerEvent::UsersOnline(serde_json::from_value(data)?),
            EventKind::UserOnline => ServerEvent::UserOnline(serde_json::from_value(data)?),
            EventKind::UserOffline => ServerEvent::UserOffline(serde_json::from_value(data)?),
            EventKind::TypingStart => ServerEvent::TypingStart(serde_json::from_value(data)?),
            EventKind::TypingStop => ServerEvent::TypingStop(serde_json::from_value(data)?),
        };

        Ok(ServerFrame::Event(event))
    }
}
