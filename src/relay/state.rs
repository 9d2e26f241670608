//! Relay state: per-room message logs and presence.
//!
//! DESIGN
//! ======
//! `RelayState` is injected into Axum handlers via the `State` extractor and
//! wraps a single `RelayStore` behind a tokio `RwLock`. The store itself is
//! plain data with synchronous methods, so the ordering rules can be tested
//! without a runtime.
//!
//! Each room log keeps messages in arrival order. Timestamps never go
//! backwards within a room and every message gets the next per-room `seq`,
//! so clients polling with `after` see a stable order.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::message::{ActiveUser, ChatMessage, MessagePage, MessageType};

// =============================================================================
// ROOM LOG
// =============================================================================

/// Validated fields of an incoming message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: String,
    pub sender_name: String,
    pub body: String,
    pub message_type: MessageType,
}

/// Filters for a history or poll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    pub limit: usize,
    pub before: Option<OffsetDateTime>,
    pub after: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
pub struct RoomLog {
    messages: VecDeque<ChatMessage>,
    next_seq: u64,
}

impl RoomLog {
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    /// Store a message, dropping the oldest entries beyond `cap`.
    pub fn append(&mut self, room_id: &str, draft: NewMessage, now: OffsetDateTime, cap: usize) -> ChatMessage {
        let timestamp = match self.messages.back() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        self.next_seq += 1;
        let message = ChatMessage {
            id: format!("msg_{}", Uuid::new_v4().simple()),
            room_id: room_id.to_owned(),
            sender_id: draft.sender_id,
            sender_name: draft.sender_name,
            body: draft.body,
            message_type: draft.message_type,
            timestamp,
            seq: Some(self.next_seq),
        };
        self.messages.push_back(message.clone());
        while self.messages.len() > cap.max(1) {
            self.messages.pop_front();
        }
        message
    }

    /// Select one page, always in chronological order.
    ///
    /// With `after`, the window starts at that instant (inclusive) and the
    /// oldest `limit` matches are returned. Otherwise the newest `limit`
    /// messages strictly older than `before` (or overall) are returned.
    #[must_use]
    pub fn page(&self, query: PageQuery) -> MessagePage {
        let matching: Vec<&ChatMessage> = self
            .messages
            .iter()
            .filter(|m| query.after.is_none_or(|after| m.timestamp >= after))
            .filter(|m| query.before.is_none_or(|before| m.timestamp < before))
            .collect();
        let has_more = matching.len() > query.limit;

        let window = if query.after.is_some() {
            &matching[..query.limit.min(matching.len())]
        } else {
            &matching[matching.len().saturating_sub(query.limit)..]
        };
        MessagePage { messages: window.iter().copied().cloned().collect(), has_more }
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Default)]
pub struct RelayStore {
    pub rooms: HashMap<String, RoomLog>,
    /// `room_id` -> `user_id` -> presence.
    pub presence: HashMap<String, HashMap<String, ActiveUser>>,
}

impl RelayStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message and refresh the sender's `last_seen` if present.
    pub fn post(&mut self, room_id: &str, draft: NewMessage, now: OffsetDateTime, cap: usize) -> ChatMessage {
        if let Some(user) = self
            .presence
            .get_mut(room_id)
            .and_then(|users| users.get_mut(&draft.sender_id))
        {
            user.last_seen = now;
        }
        self.rooms
            .entry(room_id.to_owned())
            .or_default()
            .append(room_id, draft, now, cap)
    }

    #[must_use]
    pub fn page(&self, room_id: &str, query: PageQuery) -> MessagePage {
        self.rooms
            .get(room_id)
            .map(|log| log.page(query))
            .unwrap_or_default()
    }

    /// Record presence and return the room's active users. A re-join keeps
    /// the original `joined_at`.
    pub fn join(&mut self, room_id: &str, user_id: &str, user_name: &str, now: OffsetDateTime) -> Vec<ActiveUser> {
        let users = self.presence.entry(room_id.to_owned()).or_default();
        users
            .entry(user_id.to_owned())
            .and_modify(|user| {
                user.user_name = user_name.to_owned();
                user.last_seen = now;
            })
            .or_insert_with(|| ActiveUser {
                user_id: user_id.to_owned(),
                user_name: user_name.to_owned(),
                joined_at: now,
                last_seen: now,
            });
        self.active_users(room_id)
    }

    /// Drop presence. Returns whether the user was present.
    pub fn leave(&mut self, room_id: &str, user_id: &str) -> bool {
        let Some(users) = self.presence.get_mut(room_id) else {
            return false;
        };
        let removed = users.remove(user_id).is_some();
        if users.is_empty() {
            self.presence.remove(room_id);
        }
        removed
    }

    /// Active users ordered by join time.
    #[must_use]
    pub fn active_users(&self, room_id: &str) -> Vec<ActiveUser> {
        let mut users: Vec<ActiveUser> = self
            .presence
            .get(room_id)
            .map(|users| users.values().cloned().collect())
            .unwrap_or_default();
        users.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        users
    }

    /// Presence records across all rooms.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.presence.values().map(HashMap::len).sum()
    }

    /// Rooms that have a message log.
    #[must_use]
    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }
}

// =============================================================================
// RELAY STATE
// =============================================================================

/// Shared relay state. Clone is required by Axum; the store is Arc-wrapped.
#[derive(Clone)]
pub struct RelayState {
    pub store: Arc<RwLock<RelayStore>>,
    pub config: RelayConfig,
}

impl RelayState {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self { store: Arc::new(RwLock::new(RelayStore::new())), config }
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
