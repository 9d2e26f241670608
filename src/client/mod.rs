//! Polling sync client: HTTP polling stand-in for a realtime chat socket.
//!
//! DESIGN
//! ======
//! One client owns the set of joined rooms and a single shared poll loop.
//! Each tick snapshots the subscriptions and fetches every room in turn.
//! Under the state lock it keeps only messages beyond the room's current
//! watermark and advances it. The survivors are emitted as `message` events
//! after the lock is released, so overlapping ticks never deliver the same
//! message twice.
//!
//! LIFECYCLE
//! =========
//! 1. `identify` sets the identity sent with every request
//! 2. First successful `join_room` starts the loop; the first tick runs
//!    immediately
//! 3. `leave_room` of the last room stops the loop
//! 4. `disconnect` stops the loop, drops rooms and listeners; terminal
//!
//! CONCURRENCY
//! ===========
//! Client state sits behind a `std::sync::Mutex` that is never held across
//! an `.await`. The loop is a spawned task holding a `Weak` reference, so
//! dropping every handle also ends it. Stopping cancels the inter-tick sleep
//! but lets an in-flight tick finish; a generation counter keeps a stopped
//! loop from rescheduling itself.
//!
//! ERROR HANDLING
//! ==============
//! Public operations never return errors. Failures become `error` events
//! plus a falsy return. Poll failures are only logged: the watermark stays
//! put and the next tick retries from it, which yields at-least-once
//! delivery.

pub mod api;
pub mod subscription;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, DEFAULT_HISTORY_LIMIT};
use crate::events::{ChatEvent, ErrorKind, EventBus, EventKind, HandlerId};
use crate::message::{ActiveUser, ChatMessage, MessagePage, MessageType};
use api::{ApiError, HttpRoomApi, Identity, MessageQuery, RoomApi};
use subscription::{RoomSubscription, Watermark};

/// Messages requested per room per tick.
pub const POLL_BATCH_LIMIT: usize = 20;

// =============================================================================
// STATE
// =============================================================================

struct ClientState {
    identity: Identity,
    rooms: HashMap<String, RoomSubscription>,
    poller: Option<PollerHandle>,
    generation: u64,
    disconnected: bool,
}

struct PollerHandle {
    generation: u64,
    stop: Arc<Notify>,
}

struct Inner {
    api: Arc<dyn RoomApi>,
    polling_interval: Duration,
    state: Mutex<ClientState>,
    events: EventBus,
}

/// Cheaply cloneable handle; clones share rooms, loop and listeners.
#[derive(Clone)]
pub struct PollingSyncClient {
    inner: Arc<Inner>,
}

impl PollingSyncClient {
    /// Client talking HTTP to the relay at `config.api_base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let api = HttpRoomApi::new(&config.api_base_url, config.timeouts)?;
        Ok(Self::with_api(Arc::new(api), config.polling_interval))
    }

    /// Client over an arbitrary [`RoomApi`] implementation.
    #[must_use]
    pub fn with_api(api: Arc<dyn RoomApi>, polling_interval: Duration) -> Self {
        let state = ClientState {
            identity: Identity::default(),
            rooms: HashMap::new(),
            poller: None,
            generation: 0,
            disconnected: false,
        };
        Self {
            inner: Arc::new(Inner { api, polling_interval, state: Mutex::new(state), events: EventBus::new() }),
        }
    }

    /// Set the identity attached to join, leave and send requests.
    pub fn identify(&self, user_id: impl Into<String>, user_name: impl Into<String>) {
        let mut state = self.inner.state();
        state.identity = Identity { user_id: Some(user_id.into()), user_name: Some(user_name.into()) };
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ChatEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, handler)
    }

    pub fn off(&self, kind: EventKind, id: HandlerId) -> bool {
        self.inner.events.off(kind, id)
    }

    // =========================================================================
    // ROOMS
    // =========================================================================

    /// Join `room_id` and start receiving its new messages.
    pub async fn join_room(&self, room_id: &str) -> bool {
        let Some(identity) = self.inner.live_identity() else {
            warn!(room_id, "join_room on disconnected client");
            return false;
        };

        let ack = match self.inner.api.join(room_id, &identity).await {
            Ok(ack) => ack,
            Err(e) => {
                warn!(room_id, error = %e, "join room failed");
                self.inner.emit_error(ErrorKind::JoinRoom, &e);
                return false;
            }
        };

        {
            let mut state = self.inner.state();
            if state.disconnected {
                return false;
            }
            state
                .rooms
                .insert(room_id.to_owned(), RoomSubscription::starting_now(room_id));
            self.start_polling(&mut state);
        }

        info!(room_id, active_users = ack.active_users, "joined room");
        self.inner.events.emit(&ChatEvent::RoomJoined {
            room_id: room_id.to_owned(),
            active_users: ack.active_users,
        });
        true
    }

    /// Leave `room_id`. Local state is untouched if the server refuses.
    pub async fn leave_room(&self, room_id: &str) -> bool {
        let Some(identity) = self.inner.live_identity() else {
            warn!(room_id, "leave_room on disconnected client");
            return false;
        };

        if let Err(e) = self.inner.api.leave(room_id, &identity).await {
            warn!(room_id, error = %e, "leave room failed");
            self.inner.emit_error(ErrorKind::LeaveRoom, &e);
            return false;
        }

        {
            let mut state = self.inner.state();
            state.rooms.remove(room_id);
            if state.rooms.is_empty() {
                stop_polling(&mut state);
            }
        }

        info!(room_id, "left room");
        self.inner
            .events
            .emit(&ChatEvent::RoomLeft { room_id: room_id.to_owned() });
        true
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    /// Post a message. On success the server's copy is emitted as a
    /// `message` event and returned.
    ///
    /// The same message shows up again when a later poll covers it; that copy
    /// is emitted too, and consumers deduplicate by `id`.
    pub async fn send_message(&self, room_id: &str, body: &str, message_type: MessageType) -> Option<ChatMessage> {
        let identity = self.inner.live_identity()?;
        match self
            .inner
            .api
            .send(room_id, &identity, body, &message_type)
            .await
        {
            Ok(message) => {
                debug!(room_id, message_id = %message.id, "message sent");
                self.inner
                    .events
                    .emit(&ChatEvent::Message(message.clone()));
                Some(message)
            }
            Err(e) => {
                warn!(room_id, error = %e, "send message failed");
                self.inner.emit_error(ErrorKind::SendMessage, &e);
                None
            }
        }
    }

    /// Shorthand for a plain-text [`PollingSyncClient::send_message`].
    pub async fn send_text(&self, room_id: &str, body: &str) -> Option<ChatMessage> {
        self.send_message(room_id, body, MessageType::Text).await
    }

    /// Fetch one page of history. Independent of membership and of the loop.
    pub async fn get_message_history(
        &self,
        room_id: &str,
        limit: usize,
        before: Option<OffsetDateTime>,
    ) -> MessagePage {
        let query = MessageQuery::history(limit, before);
        match self.inner.api.messages(room_id, &query).await {
            Ok(page) => page,
            Err(e) => {
                warn!(room_id, error = %e, "get message history failed");
                self.inner.emit_error(ErrorKind::GetMessages, &e);
                MessagePage::default()
            }
        }
    }

    /// [`PollingSyncClient::get_message_history`] with the default page size.
    pub async fn latest_messages(&self, room_id: &str) -> MessagePage {
        self.get_message_history(room_id, DEFAULT_HISTORY_LIMIT, None)
            .await
    }

    /// Users currently present in `room_id`. Empty on failure.
    pub async fn active_users(&self, room_id: &str) -> Vec<ActiveUser> {
        match self.inner.api.active_users(room_id).await {
            Ok(users) => users,
            Err(e) => {
                warn!(room_id, error = %e, "active users lookup failed");
                Vec::new()
            }
        }
    }

    /// Relay liveness. Any failure reads as `false`.
    pub async fn health_check(&self) -> bool {
        match self.inner.api.health().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!(error = %e, "health check failed");
                false
            }
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Stop polling and drop all rooms and listeners. The client cannot be
    /// reused afterwards.
    pub fn disconnect(&self) {
        {
            let mut state = self.inner.state();
            stop_polling(&mut state);
            state.rooms.clear();
            state.disconnected = true;
        }
        self.inner.events.close();
        info!("chat client disconnected");
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.inner.state().poller.is_some()
    }

    #[must_use]
    pub fn joined_rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.inner.state().rooms.keys().cloned().collect();
        rooms.sort();
        rooms
    }

    #[must_use]
    pub fn watermark(&self, room_id: &str) -> Option<Watermark> {
        self.inner
            .state()
            .rooms
            .get(room_id)
            .map(|room| room.watermark)
    }

    /// Run one poll tick inline, outside the loop's schedule.
    pub async fn poll_now(&self) {
        self.inner.poll_once().await;
    }

    fn start_polling(&self, state: &mut ClientState) {
        if state.poller.is_some() {
            return;
        }
        state.generation += 1;
        let generation = state.generation;
        let stop = Arc::new(Notify::new());
        state.poller = Some(PollerHandle { generation, stop: Arc::clone(&stop) });

        let interval = self.inner.polling_interval;
        info!(generation, ?interval, "polling started");
        tokio::spawn(run_poll_loop(Arc::downgrade(&self.inner), generation, stop, interval));
    }
}

fn stop_polling(state: &mut ClientState) {
    if let Some(poller) = state.poller.take() {
        poller.stop.notify_one();
        info!(generation = poller.generation, "polling stopped");
    }
}

// =============================================================================
// POLL LOOP
// =============================================================================

async fn run_poll_loop(inner: Weak<Inner>, generation: u64, stop: Arc<Notify>, interval: Duration) {
    loop {
        let Some(client) = inner.upgrade() else { break };
        if !client.is_current_poller(generation) {
            break;
        }
        client.poll_once().await;
        if !client.is_current_poller(generation) {
            break;
        }
        drop(client);

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = stop.notified() => break,
        }
    }
    debug!(generation, "poll loop exited");
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live_identity(&self) -> Option<Identity> {
        let state = self.state();
        (!state.disconnected).then(|| state.identity.clone())
    }

    fn is_current_poller(&self, generation: u64) -> bool {
        let state = self.state();
        !state.disconnected
            && state
                .poller
                .as_ref()
                .is_some_and(|p| p.generation == generation)
    }

    fn emit_error(&self, kind: ErrorKind, err: &ApiError) {
        self.events
            .emit(&ChatEvent::Error { kind, message: err.to_string() });
    }

    async fn poll_once(&self) {
        let snapshot: Vec<(String, Watermark)> = {
            let state = self.state();
            state
                .rooms
                .values()
                .map(|room| (room.room_id.clone(), room.watermark))
                .collect()
        };
        for (room_id, watermark) in snapshot {
            self.check_room(&room_id, watermark).await;
        }
    }

    async fn check_room(&self, room_id: &str, watermark: Watermark) {
        let query = MessageQuery::after(watermark.timestamp, POLL_BATCH_LIMIT);
        let page = match self.api.messages(room_id, &query).await {
            Ok(page) => page,
            Err(e) => {
                warn!(room_id, error = %e, retryable = e.retryable(), "poll failed; retrying next tick");
                return;
            }
        };

        if page.messages.is_empty() {
            return;
        }
        let fresh = {
            let mut state = self.state();
            if state.disconnected {
                return;
            }
            // A room left while this fetch was in flight stays gone.
            let Some(room) = state.rooms.get_mut(room_id) else {
                return;
            };
            // Filter against the live watermark: an overlapping tick may
            // already have delivered part of this page.
            let fresh = room.watermark.select_newer(page.messages);
            let Some(last) = fresh.last() else {
                return;
            };
            room.watermark.advance_to(last);
            fresh
        };

        debug!(room_id, count = fresh.len(), "poll delivered messages");
        for message in fresh {
            self.events.emit(&ChatEvent::Message(message));
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
