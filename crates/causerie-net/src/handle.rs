//! Session ownership and lifecycle.
//!
//! [`SessionHandle`] is the one place allowed to open or tear down the
//! real-time connection. Dependents get the handle (and its bus) injected
//! rather than reading a process-wide socket variable, and none of them may
//! close the connection themselves. Views come and go; the session stays
//! until its owner says otherwise.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info};

use causerie_shared::error::{AuthError, Result};

use crate::bus::EventBus;
use crate::session::{spawn_session, SessionCommand, SessionConfig, SessionNotification};

struct ActiveSession {
    token: String,
    cmd_tx: mpsc::Sender<SessionCommand>,
}

/// Owner of the single live session.
///
/// At most one connection exists per handle. `connect` is idempotent for
/// an unchanged token and re-dials after teardown for a changed one; the
/// liveness watch channel feeds the UI's connected indicator.
pub struct SessionHandle {
    config: SessionConfig,
    bus: Arc<EventBus>,
    inner: Mutex<Option<ActiveSession>>,
    connected_tx: watch::Sender<bool>,
    /// Bumped on every connect/disconnect; a dispatch loop whose
    /// generation no longer matches must not touch shared state.
    current_gen: Arc<AtomicU64>,
}

impl SessionHandle {
    pub fn new(config: SessionConfig, bus: Arc<EventBus>) -> Self {
        let (connected_tx, _) = watch::channel(false);
        Self {
            config,
            bus,
            inner: Mutex::new(None),
            connected_tx,
            current_gen: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Open the session with the given auth token.
    ///
    /// - Empty token: rejected with [`AuthError::MissingToken`] without
    ///   dialing. Callers must not invoke this before a token exists.
    /// - Already connected with the same token: no-op.
    /// - Connected with a different token: the previous session is torn
    ///   down first, then a fresh one is dialed.
    /// - Transport failure after the retry cap: the
    ///   `ConnectionError` from the dial is returned as-is.
    pub async fn connect(&self, token: &str) -> Result<()> {
        if token.is_empty() {
            return Err(AuthError::MissingToken.into());
        }

        let mut guard = self.inner.lock().await;

        if let Some(active) = guard.as_ref() {
            if active.token == token && !active.cmd_tx.is_closed() {
                debug!("Session already connected, reusing");
                return Ok(());
            }
            info!("Session identity changed, tearing down previous connection");
            let _ = active.cmd_tx.send(SessionCommand::Disconnect).await;
        }
        *guard = None;
        self.bus.clear_publisher();
        self.connected_tx.send_replace(false);

        let generation = self.current_gen.fetch_add(1, Ordering::SeqCst) + 1;
        let (cmd_tx, notif_rx) = spawn_session(token, self.config.clone()).await?;

        self.bus.set_publisher(cmd_tx.clone());
        *guard = Some(ActiveSession {
            token: token.to_string(),
            cmd_tx,
        });

        let bus = Arc::clone(&self.bus);
        let connected_tx = self.connected_tx.clone();
        let current_gen = Arc::clone(&self.current_gen);
        tokio::spawn(async move {
            dispatch_loop(bus, notif_rx, connected_tx, generation, current_gen).await;
        });

        Ok(())
    }

    /// Tear down the active session. Safe to call when none exists.
    pub async fn disconnect(&self) {
        let mut guard = self.inner.lock().await;

        let Some(active) = guard.take() else {
            debug!("No active session to disconnect");
            return;
        };

        info!("Disconnecting session");
        self.current_gen.fetch_add(1, Ordering::SeqCst);
        let _ = active.cmd_tx.send(SessionCommand::Disconnect).await;
        self.bus.clear_publisher();
        self.connected_tx.send_replace(false);
    }

    pub fn is_connected(&self) -> bool {
        *self.connected_tx.borrow()
    }

    /// Liveness signal for the UI's connected/disconnected indicator.
    pub fn liveness(&self) -> watch::Receiver<bool> {
        self.connected_tx.subscribe()
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

/// Forward session notifications into the bus and the liveness channel.
async fn dispatch_loop(
    bus: Arc<EventBus>,
    mut notif_rx: mpsc::Receiver<SessionNotification>,
    connected_tx: watch::Sender<bool>,
    generation: u64,
    current_gen: Arc<AtomicU64>,
) {
    while let Some(notification) = notif_rx.recv().await {
        if current_gen.load(Ordering::SeqCst) != generation {
            debug!(generation, "Stale dispatch loop ending");
            return;
        }

        match notification {
            SessionNotification::Connected => {
                connected_tx.send_replace(true);
            }
            SessionNotification::Disconnected => {
                connected_tx.send_replace(false);
            }
            SessionNotification::Event(event) => {
                bus.dispatch(&event);
            }
        }
    }

    // The session task ended: clean disconnect or exhausted retries.
    if current_gen.load(Ordering::SeqCst) == generation {
        connected_tx.send_replace(false);
        bus.clear_publisher();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestServer;
    use causerie_shared::error::CauserieError;
    use causerie_shared::protocol::{ClientEvent, EventKind, ServerEvent};
    use causerie_shared::types::UserId;
    use std::time::Duration;

    fn handle_for(server: &TestServer) -> SessionHandle {
        let config = SessionConfig {
            url: server.url(),
            reconnect_attempts: 2,
            reconnect_delay: Duration::from_millis(20),
        };
        SessionHandle::new(config, Arc::new(EventBus::new()))
    }

    async fn wait_connected(handle: &SessionHandle) {
        let mut liveness = handle.liveness();
        tokio::time::timeout(Duration::from_secs(1), liveness.wait_for(|up| *up))
            .await
            .expect("liveness timeout")
            .expect("liveness channel closed");
    }

    #[tokio::test]
    async fn test_connect_without_token_is_an_auth_error() {
        let server = TestServer::spawn().await;
        let handle = handle_for(&server);

        match handle.connect("").await {
            Err(CauserieError::Auth(AuthError::MissingToken)) => {}
            other => panic!("Expected MissingToken, got {other:?}"),
        }
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_for_same_token() {
        let server = TestServer::spawn().await;
        let handle = handle_for(&server);

        handle.connect("tok").await.unwrap();
        let _conn = server.next_connection().await;
        wait_connected(&handle).await;

        handle.connect("tok").await.unwrap();

        // No second handshake reaches the backend.
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            server.next_connection(),
        )
        .await;
        assert!(second.is_err());
        assert!(handle.is_connected());
    }

    #[tokio::test]
    async fn test_token_change_tears_down_and_redials() {
        let server = TestServer::spawn().await;
        let handle = handle_for(&server);

        handle.connect("tok-old").await.unwrap();
        let first = server.next_connection().await;
        assert_eq!(first.query(), "token=tok-old");
        wait_connected(&handle).await;

        handle.connect("tok-new").await.unwrap();
        let second = server.next_connection().await;
        assert_eq!(second.query(), "token=tok-new");
        wait_connected(&handle).await;
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_a_noop() {
        let server = TestServer::spawn().await;
        let handle = handle_for(&server);

        handle.disconnect().await;
        assert!(!handle.is_connected());
    }

    #[tokio::test]
    async fn test_publish_after_disconnect_is_dropped() {
        let server = TestServer::spawn().await;
        let handle = handle_for(&server);

        handle.connect("tok").await.unwrap();
        let _conn = server.next_connection().await;
        wait_connected(&handle).await;

        handle.disconnect().await;
        assert!(!handle.is_connected());

        let ack = handle
            .bus()
            .publish(ClientEvent::TypingStart {
                receiver_id: UserId::from("u2"),
            })
            .await;
        assert!(ack.is_none());
    }

    #[tokio::test]
    async fn test_events_reach_bus_subscribers() {
        let server = TestServer::spawn().await;
        let handle = handle_for(&server);

        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        handle.bus().subscribe(EventKind::MessageNew, move |event| {
            if let ServerEvent::MessageNew(msg) = event {
                let _ = seen_tx.send(msg.content.clone());
            }
        });

        handle.connect("tok").await.unwrap();
        let conn = server.next_connection().await;
        wait_connected(&handle).await;

        conn.send(
            r#"{
                "event": "message:new",
                "data": {
                    "_id": "m1",
                    "content": "salut",
                    "senderId": "ub",
                    "receiverId": "ua",
                    "timestamp": "2024-03-01T12:00:00Z",
                    "status": "sent"
                }
            }"#,
        )
        .await;

        let content = tokio::time::timeout(Duration::from_secs(1), seen_rx.recv())
            .await
            .expect("event timeout")
            .expect("channel closed");
        assert_eq!(content, "salut");
    }
}
