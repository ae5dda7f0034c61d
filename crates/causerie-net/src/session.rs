//! Session task with tokio mpsc command/notification pattern.
//!
//! The WebSocket connection runs in a dedicated tokio task. External code
//! communicates with it through typed command and notification channels,
//! keeping the transport layer fully asynchronous and decoupled from the
//! state that consumes its events.

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message as WsMessage},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};

use causerie_shared::constants::{
    RECONNECT_ATTEMPTS, RECONNECT_DELAY_MS, SESSION_CHANNEL_CAPACITY, WS_PATH,
};
use causerie_shared::error::ConnectionError;
use causerie_shared::protocol::{ClientEvent, ClientFrame, ServerEvent, ServerFrame};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the session task.
#[derive(Debug)]
pub enum SessionCommand {
    /// Emit an event over the connection. The reply channel fires with the
    /// backend's acknowledgement payload, if one ever arrives.
    Publish {
        event: ClientEvent,
        reply: oneshot::Sender<serde_json::Value>,
    },
    /// Close the connection and end the task.
    Disconnect,
}

/// Notifications sent *from* the session task to the application.
#[derive(Debug, Clone)]
pub enum SessionNotification {
    /// The connection is up (initially, or again after a re-dial).
    Connected,
    /// The connection dropped; the task is attempting to re-dial.
    Disconnected,
    /// A decoded event from the backend.
    Event(ServerEvent),
}

/// Configuration for spawning a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Full WebSocket endpoint, e.g. `ws://localhost:5000/ws`.
    pub url: String,
    /// Connection attempts per dial before giving up.
    pub reconnect_attempts: u32,
    /// Fixed delay between attempts.
    pub reconnect_delay: Duration,
}

impl SessionConfig {
    /// Derive the WebSocket endpoint from a backend HTTP base URL.
    pub fn for_backend(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let url = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}{WS_PATH}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}{WS_PATH}")
        } else {
            format!("{base}{WS_PATH}")
        };
        Self {
            url,
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_attempts: RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
        }
    }
}

/// Spawn the session in a background tokio task.
///
/// Dials the backend with the token bound to the handshake URL; the backend
/// authenticates the connection before upgrading it. The initial dial
/// retries up to the configured cap and rejects with [`ConnectionError`]
/// on exhaustion; the caller decides what to do with a session that never
/// came up.
///
/// # Returns
///
/// `(command_tx, notification_rx)`
pub async fn spawn_session(
    token: &str,
    config: SessionConfig,
) -> Result<
    (
        mpsc::Sender<SessionCommand>,
        mpsc::Receiver<SessionNotification>,
    ),
    ConnectionError,
> {
    let url = format!("{}?token={}", config.url, token);

    let socket = dial(&url, config.reconnect_attempts, config.reconnect_delay).await?;

    info!(endpoint = %config.url, "Session connected");

    let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(SESSION_CHANNEL_CAPACITY);
    let (notif_tx, notif_rx) = mpsc::channel::<SessionNotification>(SESSION_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        session_loop(socket, url, config, cmd_rx, notif_tx).await;
    });

    Ok((cmd_tx, notif_rx))
}

async fn session_loop(
    mut socket: Socket,
    url: String,
    config: SessionConfig,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    notif_tx: mpsc::Sender<SessionNotification>,
) {
    let _ = notif_tx.send(SessionNotification::Connected).await;

    let mut next_seq: u64 = 1;
    let mut pending_acks: HashMap<u64, oneshot::Sender<serde_json::Value>> = HashMap::new();

    loop {
        tokio::select! {
            // --- Incoming commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::Publish { event, reply }) => {
                        let seq = next_seq;
                        next_seq += 1;

                        let frame = ClientFrame { seq, event };
                        match frame.encode() {
                            Ok(text) => {
                                debug!(seq, event = %frame.event.kind(), "Publishing frame");
                                if let Err(e) = socket.send(WsMessage::Text(text)).await {
                                    warn!(seq, error = %e, "Frame write failed");
                                    // The read side will observe the closed
                                    // socket and drive reconnection.
                                } else {
                                    pending_acks.insert(seq, reply);
                                }
                            }
                            Err(e) => {
                                error!(error = %e, "Frame encoding failed");
                            }
                        }
                    }
                    Some(SessionCommand::Disconnect) => {
                        info!("Session disconnect requested");
                        let _ = socket.close(None).await;
                        break;
                    }
                    None => {
                        // All senders dropped
                        info!("Command channel closed, ending session");
                        let _ = socket.close(None).await;
                        break;
                    }
                }
            }

            // --- Socket traffic ---
            incoming = socket.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        handle_frame(&text, &mut pending_acks, &notif_tx).await;
                    }
                    Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {
                        // Keepalive handled by tungstenite itself.
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        warn!("Backend sent close, reconnecting");
                        if !reconnect(&mut socket, &url, &config, &mut pending_acks, &notif_tx).await {
                            break;
                        }
                    }
                    Some(Ok(other)) => {
                        debug!(frame = ?other, "Ignoring non-text frame");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Socket error, reconnecting");
                        if !reconnect(&mut socket, &url, &config, &mut pending_acks, &notif_tx).await {
                            break;
                        }
                    }
                    None => {
                        warn!("Socket closed by backend, reconnecting");
                        if !reconnect(&mut socket, &url, &config, &mut pending_acks, &notif_tx).await {
                            break;
                        }
                    }
                }
            }
        }
    }

    info!("Session event loop terminated");
}

/// Decode one inbound frame: resolve a pending ack or forward an event.
async fn handle_frame(
    text: &str,
    pending_acks: &mut HashMap<u64, oneshot::Sender<serde_json::Value>>,
    notif_tx: &mpsc::Sender<SessionNotification>,
) {
    match ServerFrame::parse(text) {
        Ok(ServerFrame::Ack { seq, data }) => {
            match pending_acks.remove(&seq) {
                Some(reply) => {
                    let _ = reply.send(data);
                }
                None => debug!(seq, "Ack for unknown sequence"),
            }
        }
        Ok(ServerFrame::Event(event)) => {
            debug!(event = %event.kind(), "Event received");
            let _ = notif_tx.send(SessionNotification::Event(event)).await;
        }
        Err(e) => {
            warn!(error = %e, "Dropping undecodable frame");
        }
    }
}

/// Re-dial after a mid-session loss. Returns `false` when the retry cap
/// is exhausted and the task should end.
async fn reconnect(
    socket: &mut Socket,
    url: &str,
    config: &SessionConfig,
    pending_acks: &mut HashMap<u64, oneshot::Sender<serde_json::Value>>,
    notif_tx: &mpsc::Sender<SessionNotification>,
) -> bool {
    // Replies parked on the dead connection will never be acked.
    pending_acks.clear();
    let _ = notif_tx.send(SessionNotification::Disconnected).await;

    match dial(url, config.reconnect_attempts, config.reconnect_delay).await {
        Ok(new_socket) => {
            *socket = new_socket;
            info!("Session reconnected");
            let _ = notif_tx.send(SessionNotification::Connected).await;
            true
        }
        Err(e) => {
            warn!(error = %e, "Reconnection attempts exhausted");
            false
        }
    }
}

/// Dial with a capped number of fixed-delay attempts.
///
/// A handshake the backend actively rejects (non-101 response, e.g. an
/// invalid token) fails immediately. Retrying an auth rejection cannot
/// succeed.
async fn dial(url: &str, attempts: u32, delay: Duration) -> Result<Socket, ConnectionError> {
    for attempt in 1..=attempts {
        match connect_async(url).await {
            Ok((socket, _response)) => {
                if attempt > 1 {
                    info!(attempt, "Connected after retry");
                }
                return Ok(socket);
            }
            Err(tungstenite::Error::Http(response)) => {
                return Err(ConnectionError::Handshake(format!(
                    "backend rejected handshake: {}",
                    response.status()
                )));
            }
            Err(e) => {
                warn!(attempt, error = %e, "Dial failed");
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    Err(ConnectionError::RetriesExhausted { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestServer;
    use causerie_shared::types::UserId;

    fn fast_config(url: String) -> SessionConfig {
        SessionConfig {
            url,
            reconnect_attempts: 2,
            reconnect_delay: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_for_backend_maps_schemes() {
        assert_eq!(
            SessionConfig::for_backend("http://localhost:5000").url,
            "ws://localhost:5000/ws"
        );
        assert_eq!(
            SessionConfig::for_backend("https://chat.example.com/").url,
            "wss://chat.example.com/ws"
        );
    }

    #[tokio::test]
    async fn test_connects_and_receives_events() {
        let server = TestServer::spawn().await;
        let (_cmd_tx, mut notif_rx) = spawn_session("tok", fast_config(server.url()))
            .await
            .unwrap();

        assert!(matches!(
            notif_rx.recv().await,
            Some(SessionNotification::Connected)
        ));

        let conn = server.next_connection().await;
        assert_eq!(conn.query(), "token=tok");

        conn.send(r#"{"event": "typing:start", "data": {"userId": "u7"}}"#)
            .await;

        match notif_rx.recv().await {
            Some(SessionNotification::Event(ServerEvent::TypingStart(p))) => {
                assert_eq!(p.user_id, UserId::from("u7"));
            }
            other => panic!("Unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_resolves_with_ack() {
        let server = TestServer::spawn().await;
        let (cmd_tx, mut notif_rx) = spawn_session("tok", fast_config(server.url()))
            .await
            .unwrap();
        let _ = notif_rx.recv().await; // Connected

        let conn = server.next_connection().await;

        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(SessionCommand::Publish {
                event: ClientEvent::TypingStart {
                    receiver_id: UserId::from("u2"),
                },
                reply: reply_tx,
            })
            .await
            .unwrap();

        let frame: serde_json::Value = serde_json::from_str(&conn.recv().await).unwrap();
        assert_eq!(frame["event"], "typing:start");
        assert_eq!(frame["data"]["receiverId"], "u2");

        let seq = frame["seq"].as_u64().unwrap();
        conn.send(&format!(r#"{{"ack": {seq}, "data": {{"ok": true}}}}"#))
            .await;

        let ack = reply_rx.await.unwrap();
        assert_eq!(ack["ok"], true);
    }

    #[tokio::test]
    async fn test_undecodable_frames_do_not_kill_the_stream() {
        let server = TestServer::spawn().await;
        let (_cmd_tx, mut notif_rx) = spawn_session("tok", fast_config(server.url()))
            .await
            .unwrap();
        let _ = notif_rx.recv().await; // Connected

        let conn = server.next_connection().await;
        conn.send("not json at all").await;
        conn.send(r#"{"event": "message:deleted", "data": {}}"#).await;
        conn.send(r#"{"event": "user:online", "data": {"userId": "u1"}}"#)
            .await;

        match notif_rx.recv().await {
            Some(SessionNotification::Event(ServerEvent::UserOnline(p))) => {
                assert_eq!(p.user_id, UserId::from("u1"));
            }
            other => panic!("Unexpected notification: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reconnects_after_server_drop() {
        let server = TestServer::spawn().await;
        let (_cmd_tx, mut notif_rx) = spawn_session("tok", fast_config(server.url()))
            .await
            .unwrap();
        let _ = notif_rx.recv().await; // Connected

        let conn = server.next_connection().await;
        conn.close().await;

        assert!(matches!(
            notif_rx.recv().await,
            Some(SessionNotification::Disconnected)
        ));
        assert!(matches!(
            notif_rx.recv().await,
            Some(SessionNotification::Connected)
        ));

        // The re-dial reaches the server as a fresh handshake.
        let conn = server.next_connection().await;
        assert_eq!(conn.query(), "token=tok");
    }

    #[tokio::test]
    async fn test_dial_exhaustion_rejects() {
        // Nothing listens on this port: bind-then-drop to reserve a dead one.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = fast_config(format!("ws://{addr}/ws"));
        match spawn_session("tok", config).await {
            Err(ConnectionError::RetriesExhausted { attempts }) => assert_eq!(attempts, 2),
            other => panic!("Expected retry exhaustion, got {other:?}"),
        }
    }
}
