//! # causerie-client
//!
//! Client core for the Causerie real-time chat. Owns the REST collaborator
//! calls, the session lifecycle, and the local state (conversations,
//! roster, typing) folded from session events.
//!
//! The [`ChatClient`] facade ties it together: log in, connect, open a
//! conversation, send messages, feed it input changes, and read the merged
//! view back out. Everything heavier (persistence, auth issuance,
//! presence computation) lives in the backend this client talks to.

pub mod api;
pub mod bridge;
pub mod config;
pub mod conversations;
pub mod roster;
pub mod state;
pub mod typing;

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};

use causerie_net::bus::{EventBus, Subscription};
use causerie_net::handle::SessionHandle;
use causerie_net::session::SessionConfig;
use causerie_shared::constants::SESSION_CHANNEL_CAPACITY;
use causerie_shared::error::{AuthError, ConnectionError, Result};
use causerie_shared::types::{ConversationKey, Message, User, UserId};

pub use api::ApiClient;
pub use config::ClientConfig;
pub use state::ClientState;
pub use typing::TypingCoordinator;

/// Initialise tracing with an env-filter override.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("causerie_client=debug,causerie_net=debug,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Facade over the whole client core.
///
/// Construction wires the pieces together: one [`EventBus`], one
/// [`SessionHandle`] owning the connection, the state bridge subscribed to
/// inbound events, and the typing coordinator emitting through the bus.
/// The handle stays the only component allowed to tear the session down.
pub struct ChatClient {
    api: ApiClient,
    session: SessionHandle,
    state: Arc<Mutex<ClientState>>,
    typing: TypingCoordinator,
    _subscriptions: Vec<Subscription>,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api = ApiClient::new(&config.backend_url)?;

        let bus = Arc::new(EventBus::new());
        let session_config = SessionConfig {
            reconnect_attempts: config.reconnect_attempts,
            reconnect_delay: config.reconnect_delay,
            ..SessionConfig::for_backend(&config.backend_url)
        };
        let session = SessionHandle::new(session_config, Arc::clone(&bus));

        let state = Arc::new(Mutex::new(ClientState::new()));
        let subscriptions = bridge::attach(&bus, Arc::clone(&state));

        let (emit_tx, emit_rx) = mpsc::channel(SESSION_CHANNEL_CAPACITY);
        bridge::spawn_emit_forwarder(Arc::clone(&bus), emit_rx);
        let typing = TypingCoordinator::new(emit_tx, config.typing_idle);

        Ok(Self {
            api,
            session,
            state,
            typing,
            _subscriptions: subscriptions,
        })
    }

    // --- Auth ---

    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let user = self.api.login(email, password).await?;
        if let Ok(mut guard) = self.state.lock() {
            guard.current_user = Some(user.clone());
        }
        Ok(user)
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let user = self.api.register(name, email, password).await?;
        if let Ok(mut guard) = self.state.lock() {
            guard.current_user = Some(user.clone());
        }
        Ok(user)
    }

    /// Log out and reset local state. A failed logout request is logged,
    /// not surfaced: the local session ends either way.
    pub async fn logout(&self) {
        if let Err(e) = self.api.logout().await {
            warn!(error = %e, "Logout request failed");
        }
        self.session.disconnect().await;
        if let Ok(mut guard) = self.state.lock() {
            *guard = ClientState::new();
        }
    }

    // --- Session lifecycle ---

    /// Fetch a fresh session token and open the connection with it.
    ///
    /// Idempotent while the token is unchanged; a rotated token tears the
    /// old session down first.
    pub async fn connect(&self) -> Result<()> {
        let token = self.api.socket_token().await?;
        self.session.connect(&token).await
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Liveness signal for the connected/disconnected indicator.
    pub fn liveness(&self) -> watch::Receiver<bool> {
        self.session.liveness()
    }

    // --- Conversations ---

    /// Fetch the roster and replace the local copy.
    pub async fn refresh_users(&self) -> Result<Vec<User>> {
        let users = self.api.list_users().await?;
        if let Ok(mut guard) = self.state.lock() {
            guard.roster.replace(users.clone());
        }
        Ok(users)
    }

    /// Fetch history with a peer and seed its conversation bucket.
    pub async fn open_conversation(&self, peer: &UserId) -> Result<ConversationKey> {
        let history = self.api.message_history(peer).await?;

        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let current = guard
            .current_user
            .as_ref()
            .map(|u| u.id.clone())
            .ok_or(AuthError::Unauthorized)?;
        Ok(guard.conversations.load_history(&current, peer, history))
    }

    /// Send a message to a peer.
    ///
    /// Refused while disconnected (the UI disables the affordance). The
    /// message is posted over HTTP and appears in the conversation only
    /// when the backend echoes it via `message:sent`; submitting also ends
    /// the local typing burst.
    pub async fn send_message(&self, peer: &UserId, content: &str) -> Result<()> {
        if !self.session.is_connected() {
            return Err(ConnectionError::NotConnected.into());
        }

        self.api.send_message(peer, content).await?;
        self.typing.message_submitted(peer).await;
        Ok(())
    }

    /// Feed a local input change into the typing coordinator.
    pub async fn input_changed(&self, peer: &UserId, text: &str) {
        self.typing.input_changed(peer, text).await;
    }

    // --- State accessors ---

    pub fn current_user(&self) -> Option<User> {
        self.state
            .lock()
            .ok()
            .and_then(|guard| guard.current_user.clone())
    }

    pub fn users(&self) -> Vec<User> {
        match self.state.lock() {
            Ok(guard) => guard.roster.users().to_vec(),
            Err(_) => Vec::new(),
        }
    }

    pub fn search_users(&self, query: &str) -> Vec<User> {
        match self.state.lock() {
            Ok(guard) => guard.roster.search(query).into_iter().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Messages exchanged with one peer, in arrival order.
    pub fn messages_with(&self, peer: &UserId) -> Vec<Message> {
        let Ok(guard) = self.state.lock() else {
            return Vec::new();
        };
        let Some(current) = guard.current_user.as_ref() else {
            return Vec::new();
        };
        let key = ConversationKey::between(&current.id, peer);
        guard.conversations.messages_for(&key).to_vec()
    }

    pub fn is_peer_typing(&self, peer: &UserId) -> bool {
        self.state
            .lock()
            .map(|guard| guard.typing.contains(peer))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_shared::error::CauserieError;

    fn offline_client() -> ChatClient {
        // Nothing listens here; only paths that never touch the network
        // are exercised.
        let config = ClientConfig {
            backend_url: "http://127.0.0.1:9".to_string(),
            ..ClientConfig::default()
        };
        ChatClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_send_message_is_refused_while_disconnected() {
        let client = offline_client();

        match client.send_message(&UserId::from("b"), "hello").await {
            Err(CauserieError::Connection(ConnectionError::NotConnected)) => {}
            other => panic!("Expected NotConnected, got {other:?}"),
        }

        // Nothing was appended anywhere.
        assert!(client.messages_with(&UserId::from("b")).is_empty());
    }

    #[tokio::test]
    async fn test_fresh_client_is_empty_and_disconnected() {
        let client = offline_client();

        assert!(!client.is_connected());
        assert!(client.current_user().is_none());
        assert!(client.users().is_empty());
        assert!(!client.is_peer_typing(&UserId::from("b")));
    }

    #[tokio::test]
    async fn test_typing_input_without_session_is_silent() {
        let client = offline_client();

        // The emission reaches the bus and is dropped there; no session,
        // no error, no panic.
        client.input_changed(&UserId::from("b"), "hel").await;
        client.send_message(&UserId::from("b"), "x").await.ok();
    }
}
