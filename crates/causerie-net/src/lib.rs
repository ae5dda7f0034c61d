// Real-time session layer: one WebSocket connection to the backend, driven
// by a background task, with a typed event bus on top.

pub mod bus;
pub mod handle;
pub mod session;

pub use bus::{EventBus, Subscription};
pub use handle::SessionHandle;
pub use session::{spawn_session, SessionCommand, SessionConfig, SessionNotification};

#[cfg(test)]
pub(crate) mod testutil;
