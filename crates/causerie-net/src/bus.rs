//! Typed publish/subscribe over the session.
//!
//! Handlers are registered per [`EventKind`] and run synchronously, in
//! registration order, when the session's dispatch loop hands an event to
//! [`EventBus::dispatch`]. Publishing while no session is active is a
//! silent no-op: the UI disables its affordances when disconnected, so a
//! stray emit is dropped rather than queued or failed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use causerie_shared::constants::ACK_TIMEOUT_MS;
use causerie_shared::protocol::{ClientEvent, EventKind, ServerEvent};

use crate::session::SessionCommand;

type Handler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

struct Registration {
    id: u64,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventKind, Vec<Registration>>,
}

pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
    /// Command channel of the active session, if any. The session handle
    /// installs and clears it; everyone else only publishes through it.
    publisher: Mutex<Option<mpsc::Sender<SessionCommand>>>,
    ack_timeout: Duration,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_ack_timeout(Duration::from_millis(ACK_TIMEOUT_MS))
    }

    pub fn with_ack_timeout(ack_timeout: Duration) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            publisher: Mutex::new(None),
            ack_timeout,
        }
    }

    /// Register a handler for one event kind.
    ///
    /// The returned [`Subscription`] deregisters exactly this registration;
    /// dropping it without calling `unsubscribe` leaves the handler in
    /// place for the lifetime of the bus.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            let id = registry.next_id;
            registry.next_id += 1;
            registry.handlers.entry(kind).or_default().push(Registration {
                id,
                handler: Arc::new(handler),
            });
            id
        };

        Subscription {
            registry: Arc::clone(&self.registry),
            kind,
            id,
        }
    }

    /// Run every handler registered for the event's kind, in registration
    /// order. Handlers are invoked outside the registry lock so they may
    /// themselves subscribe or unsubscribe.
    pub fn dispatch(&self, event: &ServerEvent) {
        let handlers: Vec<Handler> = {
            let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry
                .handlers
                .get(&event.kind())
                .map(|regs| regs.iter().map(|r| Arc::clone(&r.handler)).collect())
                .unwrap_or_default()
        };

        for handler in handlers {
            handler(event);
        }
    }

    /// Emit an event over the active session.
    ///
    /// Resolves with the backend's acknowledgement payload if one arrives
    /// within the ack window, and `None` otherwise. That includes the
    /// degraded case where no session is active, which emits nothing and
    /// does not fail.
    pub async fn publish(&self, event: ClientEvent) -> Option<Value> {
        let cmd_tx = match self.publisher.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };

        let Some(cmd_tx) = cmd_tx else {
            debug!(event = %event.kind(), "No active session, dropping emit");
            return None;
        };

        let kind = event.kind();
        let (reply_tx, reply_rx) = oneshot::channel();

        if cmd_tx
            .send(SessionCommand::Publish {
                event,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            debug!(event = %kind, "Session task gone, dropping emit");
            return None;
        }

        match tokio::time::timeout(self.ack_timeout, reply_rx).await {
            Ok(Ok(ack)) => Some(ack),
            // Reply dropped (disconnect) or no ack within the window.
            Ok(Err(_)) | Err(_) => None,
        }
    }

    pub(crate) fn set_publisher(&self, cmd_tx: mpsc::Sender<SessionCommand>) {
        if let Ok(mut guard) = self.publisher.lock() {
            *guard = Some(cmd_tx);
        }
    }

    pub(crate) fn clear_publisher(&self) {
        if let Ok(mut guard) = self.publisher.lock() {
            *guard = None;
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability to deregister one handler/event pair. Idempotent.
pub struct Subscription {
    registry: Arc<Mutex<Registry>>,
    kind: EventKind,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Ok(mut registry) = self.registry.lock() {
            if let Some(regs) = registry.handlers.get_mut(&self.kind) {
                regs.retain(|r| r.id != self.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use causerie_shared::protocol::UserRef;
    use causerie_shared::types::UserId;

    fn online_event(id: &str) -> ServerEvent {
        ServerEvent::UserOnline(UserRef {
            user_id: UserId::from(id),
        })
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in [1, 2, 3] {
            let calls = Arc::clone(&calls);
            bus.subscribe(EventKind::UserOnline, move |_| {
                calls.lock().unwrap().push(tag);
            });
        }

        bus.dispatch(&online_event("u1"));
        assert_eq!(*calls.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_unsubscribe_removes_exactly_one_registration() {
        let bus = EventBus::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let calls = Arc::clone(&calls);
            bus.subscribe(EventKind::UserOnline, move |_| {
                calls.lock().unwrap().push("first");
            })
        };
        {
            let calls = Arc::clone(&calls);
            bus.subscribe(EventKind::UserOnline, move |_| {
                calls.lock().unwrap().push("second");
            });
        }

        first.unsubscribe();
        first.unsubscribe(); // idempotent

        bus.dispatch(&online_event("u1"));
        assert_eq!(*calls.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn test_dispatch_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.dispatch(&online_event("u1"));
    }

    #[tokio::test]
    async fn test_publish_without_session_resolves_none() {
        let bus = EventBus::new();
        let ack = bus
            .publish(ClientEvent::TypingStart {
                receiver_id: UserId::from("u2"),
            })
            .await;
        assert!(ack.is_none());
    }

    #[tokio::test]
    async fn test_publish_to_dead_session_resolves_none() {
        let bus = EventBus::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        drop(cmd_rx);
        bus.set_publisher(cmd_tx);

        let ack = bus
            .publish(ClientEvent::TypingStop {
                receiver_id: UserId::from("u2"),
            })
            .await;
        assert!(ack.is_none());
    }

    #[tokio::test]
    async fn test_publish_without_ack_times_out_to_none() {
        let bus = EventBus::with_ack_timeout(Duration::from_millis(20));
        let (cmd_tx, mut cmd_rx) = mpsc::channel(1);
        bus.set_publisher(cmd_tx);

        // A session that swallows the frame and never acks.
        tokio::spawn(async move {
            let _held = cmd_rx.recv().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let ack = bus
            .publish(ClientEvent::TypingStart {
                receiver_id: UserId::from("u2"),
            })
            .await;
        assert!(ack.is_none());
    }
}
