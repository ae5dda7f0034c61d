//! Client state shared between the facade and the event bridge.
//!
//! The [`ClientState`] struct is wrapped in `Arc<Mutex<>>`: bus handlers
//! mutate it as events arrive, the facade reads it for the UI.

use causerie_shared::types::User;

use crate::conversations::ConversationStore;
use crate::roster::Roster;
use crate::typing::TypingSet;

/// Central client state.
pub struct ClientState {
    /// The authenticated user. `None` until login succeeds; presence and
    /// message events are dropped while unset because no conversation key
    /// can be derived without it.
    pub current_user: Option<User>,

    /// Known contacts with their presence.
    pub roster: Roster,

    /// Per-conversation message sequences.
    pub conversations: ConversationStore,

    /// Peers currently typing toward the current user.
    pub typing: TypingSet,
}

impl ClientState {
    /// Create a new, logged-out client state.
    pub fn new() -> Self {
        Self {
            current_user: None,
            roster: Roster::new(),
            conversations: ConversationStore::new(),
            typing: TypingSet::new(),
        }
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}
