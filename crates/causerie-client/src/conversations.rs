//! Per-conversation message sequences.
//!
//! The store owns the mapping from [`ConversationKey`] to its ordered
//! message list. Buckets are append-only within a session: no reordering,
//! no dedup. A message is recorded in arrival order exactly as the
//! session delivered it. Outbound messages are appended only when the
//! backend echoes them back (`message:sent`), so between submit and echo
//! the conversation intentionally shows nothing for the new message.

use std::collections::HashMap;

use causerie_shared::types::{ConversationKey, Message, UserId};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    buckets: HashMap<ConversationKey, Vec<Message>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message received from a peer.
    ///
    /// The bucket is derived from the sender and the current user, so both
    /// participants converge on the same key for the same exchange.
    pub fn record_inbound(&mut self, current_user: &UserId, message: Message) -> ConversationKey {
        let key = ConversationKey::between(&message.sender_id, current_user);
        debug!(key = %key, id = %message.id, "Inbound message recorded");
        self.buckets.entry(key.clone()).or_default().push(message);
        key
    }

    /// Record the backend's echo of a message the current user sent.
    pub fn record_outbound_echo(
        &mut self,
        current_user: &UserId,
        message: Message,
    ) -> ConversationKey {
        let key = ConversationKey::between(current_user, &message.receiver_id);
        debug!(key = %key, id = %message.id, "Outbound echo recorded");
        self.buckets.entry(key.clone()).or_default().push(message);
        key
    }

    /// Seed a conversation from a history fetch, replacing whatever the
    /// bucket held. Echoes arriving afterwards append behind the history.
    pub fn load_history(
        &mut self,
        current_user: &UserId,
        peer: &UserId,
        messages: Vec<Message>,
    ) -> ConversationKey {
        let key = ConversationKey::between(current_user, peer);
        debug!(key = %key, count = messages.len(), "History loaded");
        self.buckets.insert(key.clone(), messages);
        key
    }

    /// Read-only projection of one conversation. Unknown keys are an empty
    /// sequence, never an error.
    pub fn messages_for(&self, key: &ConversationKey) -> &[Message] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn conversation_count(&self) -> usize {
        self.buckets.len()
    }
}
