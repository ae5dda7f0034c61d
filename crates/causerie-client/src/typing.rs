//! Typing signals, local and remote.
//!
//! The local side is a per-peer Idle → Typing → Idle machine: the first
//! keystroke of a burst emits `typing:start`, every keystroke re-arms a
//! fixed inactivity timer, and the timer elapsing or the message being
//! submitted emits `typing:stop`. Exactly one emission per transition, no
//! matter how many keystrokes happen in between.
//!
//! The remote side is a plain event-driven set: peers appear on
//! `typing:start` and disappear on `typing:stop`. There is deliberately no
//! local timeout on entries: a stop lost in transit leaves the peer shown
//! as typing until the next start/stop pair arrives.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use causerie_shared::protocol::ClientEvent;
use causerie_shared::types::UserId;

#[derive(Default)]
struct DirectionState {
    typing: bool,
    timer: Option<JoinHandle<()>>,
}

/// Debounces local keystrokes into the typing:start / typing:stop pair.
///
/// Emissions go into an mpsc channel; the client forwards them to the
/// event bus, where a disconnected session drops them silently.
pub struct TypingCoordinator {
    emit_tx: mpsc::Sender<ClientEvent>,
    idle_window: Duration,
    directions: Arc<Mutex<HashMap<UserId, DirectionState>>>,
}

impl TypingCoordinator {
    pub fn new(emit_tx: mpsc::Sender<ClientEvent>, idle_window: Duration) -> Self {
        Self {
            emit_tx,
            idle_window,
            directions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fold one local input change into the state machine.
    ///
    /// Non-empty text while Idle transitions to Typing and emits the
    /// start; every call re-arms the inactivity timer.
    pub async fn input_changed(&self, peer: &UserId, text: &str) {
        let starts = {
            let mut directions = self.directions.lock().unwrap_or_else(|e| e.into_inner());
            let state = directions.entry(peer.clone()).or_default();

            let starts = !state.typing && !text.trim().is_empty();
            if starts {
                state.typing = true;
            }

            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            state.timer = Some(self.spawn_idle_timer(peer.clone()));

            starts
        };

        if starts {
            debug!(peer = %peer, "Typing started");
            let _ = self
                .emit_tx
                .send(ClientEvent::TypingStart {
                    receiver_id: peer.clone(),
                })
                .await;
        }
    }

    /// The message was submitted: return to Idle and emit the stop, if a
    /// typing burst was in progress.
    pub async fn message_submitted(&self, peer: &UserId) {
        let stops = {
            let mut directions = self.directions.lock().unwrap_or_else(|e| e.into_inner());
            match directions.get_mut(peer) {
                Some(state) => {
                    if let Some(timer) = state.timer.take() {
                        timer.abort();
                    }
                    let was_typing = state.typing;
                    state.typing = false;
                    was_typing
                }
                None => false,
            }
        };

        if stops {
            debug!(peer = %peer, "Typing stopped on submit");
            let _ = self
                .emit_tx
                .send(ClientEvent::TypingStop {
                    receiver_id: peer.clone(),
                })
                .await;
        }
    }

    fn spawn_idle_timer(&self, peer: UserId) -> JoinHandle<()> {
        let directions = Arc::clone(&self.directions);
        let emit_tx = self.emit_tx.clone();
        let idle_window = self.idle_window;

        tokio::spawn(async move {
            tokio::time::sleep(idle_window).await;

            let stops = {
                let mut directions = directions.lock().unwrap_or_else(|e| e.into_inner());
                match directions.get_mut(&peer) {
                    Some(state) if state.typing => {
                        state.typing = false;
                        state.timer = None;
                        true
                    }
                    _ => false,
                }
            };

            if stops {
                debug!(peer = %peer, "Typing stopped on inactivity");
                let _ = emit_tx
                    .send(ClientEvent::TypingStop { receiver_id: peer })
                    .await;
            }
        })
    }
}

/// Peers currently known to be typing toward the current user.
#[derive(Debug, Clone, Default)]
pub struct TypingSet {
    peers: HashSet<UserId>,
}

impl TypingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, peer: UserId) {
        self.peers.insert(peer);
    }

    pub fn remove(&mut self, peer: &UserId) {
        self.peers.remove(peer);
    }

    pub fn contains(&self, peer: &UserId) -> bool {
        self.peers.contains(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
