//! Wiring between the event bus and the client state.
//!
//! `attach` registers one handler per inbound event kind; each folds its
//! event into the shared [`ClientState`] and nothing else. The returned
//! subscriptions are the view's to keep; unsubscribing them detaches the
//! state from the bus without touching the session itself.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use causerie_net::bus::{EventBus, Subscription};
use causerie_shared::protocol::{ClientEvent, EventKind, ServerEvent};
use causerie_shared::types::Presence;

use crate::state::ClientState;

/// Subscribe the client state to every inbound event kind.
pub fn attach(bus: &EventBus, state: Arc<Mutex<ClientState>>) -> Vec<Subscription> {
    let mut subscriptions = Vec::new();

    {
        let state = Arc::clone(&state);
        subscriptions.push(bus.subscribe(EventKind::MessageNew, move |event| {
            let ServerEvent::MessageNew(message) = event else {
                return;
            };
            let Ok(mut guard) = state.lock() else { return };
            let Some(current) = guard.current_user.as_ref().map(|u| u.id.clone()) else {
                warn!("Dropping message:new before login");
                return;
            };
            guard.conversations.record_inbound(&current, message.clone());
        }));
    }

    {
        let state = Arc::clone(&state);
        subscriptions.push(bus.subscribe(EventKind::MessageSent, move |event| {
            let ServerEvent::MessageSent(message) = event else {
                return;
            };
            let Ok(mut guard) = state.lock() else { return };
            let Some(current) = guard.current_user.as_ref().map(|u| u.id.clone()) else {
                warn!("Dropping message:sent before login");
                return;
            };
            guard
                .conversations
                .record_outbound_echo(&current, message.clone());
        }));
    }

    {
        let state = Arc::clone(&state);
        subscriptions.push(bus.subscribe(EventKind::UsersOnline, move |event| {
            let ServerEvent::UsersOnline(ids) = event else {
                return;
            };
            let Ok(mut guard) = state.lock() else { return };
            guard.roster.apply_online_snapshot(ids);
        }));
    }

    {
        let state = Arc::clone(&state);
        subscriptions.push(bus.subscribe(EventKind::UserOnline, move |event| {
            let ServerEvent::UserOnline(payload) = event else {
                return;
            };
            let Ok(mut guard) = state.lock() else { return };
            guard.roster.set_presence(&payload.user_id, Presence::Online);
        }));
    }

    {
        let state = Arc::clone(&state);
        subscriptions.push(bus.subscribe(EventKind::UserOffline, move |event| {
            let ServerEvent::UserOffline(payload) = event else {
                return;
            };
            let Ok(mut guard) = state.lock() else { return };
            guard.roster.set_presence(&payload.user_id, Presence::Offline);
        }));
    }

    {
        let state = Arc::clone(&state);
        subscriptions.push(bus.subscribe(EventKind::TypingStart, move |event| {
            let ServerEvent::TypingStart(payload) = event else {
                return;
            };
            let Ok(mut guard) = state.lock() else { return };
            guard.typing.insert(payload.user_id.clone());
        }));
    }

    {
        let state = Arc::clone(&state);
        subscriptions.push(bus.subscribe(EventKind::TypingStop, move |event| {
            let ServerEvent::TypingStop(payload) = event else {
                return;
            };
            let Ok(mut guard) = state.lock() else { return };
            guard.typing.remove(&payload.user_id);
        }));
    }

    subscriptions
}

/// Forward locally produced events (the typing coordinator's start/stop
/// pair) to the bus, where a disconnected session drops them silently.
pub fn spawn_emit_forwarder(
    bus: Arc<EventBus>,
    mut emit_rx: mpsc::Receiver<ClientEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = emit_rx.recv().await {
            let _ = bus.publish(event).await;
        }
        debug!("Emit forwarder ended");
    })
}
