//! # causerie-shared
//!
//! Domain types, wire protocol, and error taxonomy shared by the Causerie
//! client crates.
//!
//! The backend owns message persistence, auth issuance, and presence
//! computation; everything in this crate describes the client-side view of
//! that contract: users, messages, the conversation key, and the closed set
//! of events exchanged over the real-time session.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::{AuthError, CauserieError, ConnectionError, ProtocolError, RequestError, Result};
pub use protocol::{ClientEvent, ClientFrame, EventKind, ServerEvent, ServerFrame};
pub use types::{ConversationKey, Message, MessageStatus, Presence, User, UserId};
