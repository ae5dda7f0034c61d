//! In-process WebSocket backend used by the session and handle tests.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// A listening fake backend. Each accepted handshake is surfaced as a
/// [`TestConnection`] in accept order.
pub struct TestServer {
    addr: std::net::SocketAddr,
    connections: Mutex<mpsc::Receiver<TestConnection>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener addr");

        let (conn_tx, conn_rx) = mpsc::channel(8);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let conn_tx = conn_tx.clone();
                tokio::spawn(async move {
                    let (query_tx, query_rx) = oneshot::channel();
                    let ws = match tokio_tungstenite::accept_hdr_async(
                        stream,
                        move |req: &Request, resp: Response| {
                            let _ =
                                query_tx.send(req.uri().query().unwrap_or("").to_string());
                            Ok(resp)
                        },
                    )
                    .await
                    {
                        Ok(ws) => ws,
                        Err(_) => return,
                    };
                    let query = query_rx.await.unwrap_or_default();

                    let (mut write, mut read) = ws.split();
                    let (out_tx, mut out_rx) = mpsc::channel::<WsMessage>(32);
                    let (in_tx, in_rx) = mpsc::channel::<String>(32);

                    tokio::spawn(async move {
                        while let Some(msg) = out_rx.recv().await {
                            let is_close = matches!(msg, WsMessage::Close(_));
                            if write.send(msg).await.is_err() || is_close {
                                break;
                            }
                        }
                    });

                    tokio::spawn(async move {
                        while let Some(Ok(msg)) = read.next().await {
                            if let WsMessage::Text(text) = msg {
                                if in_tx.send(text).await.is_err() {
                                    break;
                                }
                            }
                        }
                    });

                    let _ = conn_tx
                        .send(TestConnection {
                            query,
                            out_tx,
                            incoming: Mutex::new(in_rx),
                        })
                        .await;
                });
            }
        });

        Self {
            addr,
            connections: Mutex::new(conn_rx),
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn next_connection(&self) -> TestConnection {
        self.connections
            .lock()
            .await
            .recv()
            .await
            .expect("test server dropped")
    }
}

/// One accepted client connection, seen from the backend side.
pub struct TestConnection {
    query: String,
    out_tx: mpsc::Sender<WsMessage>,
    incoming: Mutex<mpsc::Receiver<String>>,
}

impl TestConnection {
    /// Query string of the handshake request (carries the auth token).
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Push a text frame to the client.
    pub async fn send(&self, text: &str) {
        self.out_tx
            .send(WsMessage::Text(text.to_string()))
            .await
            .expect("connection writer gone");
    }

    /// Next text frame received from the client.
    pub async fn recv(&self) -> String {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .expect("client closed without sending")
    }

    /// Close the connection from the backend side.
    pub async fn close(&self) {
        let _ = self.out_tx.send(WsMessage::Close(None)).await;
    }
}
