//! Event bus: typed publish/subscribe for client lifecycle and messages.
//!
//! DESIGN
//! ======
//! Each client owns one `EventBus`. Listeners are registered per
//! `EventKind` and dispatched in registration order. Emission snapshots the
//! listener list and releases the lock before invoking handlers, so a handler
//! may register or remove listeners without deadlocking.
//!
//! ERROR HANDLING
//! ==============
//! A panicking handler is caught, logged, and skipped. Siblings still run and
//! the emitter never observes the panic.
//!
//! LIFECYCLE
//! =========
//! `close()` drops every listener and turns the bus into a sink: later
//! registrations are ignored and later emissions reach nobody.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, error};

use crate::message::ChatMessage;

// =============================================================================
// EVENTS
// =============================================================================

/// Event names exposed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Message,
    RoomJoined,
    RoomLeft,
    Error,
}

impl EventKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::RoomJoined => "room_joined",
            Self::RoomLeft => "room_left",
            Self::Error => "error",
        }
    }
}

/// Which operation failed, carried by [`ChatEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    JoinRoom,
    LeaveRoom,
    SendMessage,
    GetMessages,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JoinRoom => "join_room",
            Self::LeaveRoom => "leave_room",
            Self::SendMessage => "send_message",
            Self::GetMessages => "get_messages",
        }
    }
}

/// Payload delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A message confirmed by the server, either echoed from a send or
    /// observed by polling.
    Message(ChatMessage),
    RoomJoined { room_id: String, active_users: usize },
    RoomLeft { room_id: String },
    Error { kind: ErrorKind, message: String },
}

impl ChatEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Message(_) => EventKind::Message,
            Self::RoomJoined { .. } => EventKind::RoomJoined,
            Self::RoomLeft { .. } => EventKind::RoomLeft,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

// =============================================================================
// BUS
// =============================================================================

/// Opaque registration handle returned by [`EventBus::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn(&ChatEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    inner: Mutex<BusInner>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(HandlerId, Handler)>>,
    closed: bool,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` for `kind`. Returns a handle for [`EventBus::off`].
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = HandlerId(inner.next_id);
        if inner.closed {
            debug!(event = kind.as_str(), "listener registered on closed bus; ignoring");
            return id;
        }
        inner
            .listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered for `kind`.
    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        let mut inner = self.lock();
        let Some(list) = inner.listeners.get_mut(&kind) else {
            return false;
        };
        let Some(pos) = list.iter().position(|(existing, _)| *existing == id) else {
            return false;
        };
        list.remove(pos);
        true
    }

    /// Invoke every listener for the event's kind, in registration order.
    /// Returns how many handlers completed without panicking.
    pub fn emit(&self, event: &ChatEvent) -> usize {
        let kind = event.kind();
        let handlers: Vec<Handler> = {
            let inner = self.lock();
            inner
                .listeners
                .get(&kind)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    error!(event = kind.as_str(), panic = %panic_message(payload.as_ref()), "event listener panicked");
                }
            }
        }
        delivered
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Drop all listeners and refuse new ones.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.listeners.clear();
        inner.closed = true;
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
#[path = "events_test.rs"]
mod tests;
