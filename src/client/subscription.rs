//! Per-room subscription state and the delivery watermark.
//!
//! DESIGN
//! ======
//! The watermark marks the boundary below which messages count as already
//! delivered. It only moves forward. A strictly later timestamp is always
//! new; at an equal timestamp the server `seq` breaks the tie when both sides
//! carry one.
//!
//! TRADE-OFFS
//! ==========
//! Timestamp comparison cannot tell apart two messages that share an instant.
//! If one of them arrives on a later poll than the other, it is filtered out
//! as already seen. Relays that number messages avoid that gap entirely.

use time::OffsetDateTime;

use crate::message::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    pub timestamp: OffsetDateTime,
    pub seq: Option<u64>,
}

impl Watermark {
    #[must_use]
    pub fn at(timestamp: OffsetDateTime) -> Self {
        Self { timestamp, seq: None }
    }

    #[must_use]
    pub fn now() -> Self {
        Self::at(OffsetDateTime::now_utc())
    }

    /// Whether `message` lies strictly beyond this watermark.
    ///
    /// A later timestamp always admits. A relay that restarts numbers its
    /// rooms from 1 again, so a lower `seq` alone never rejects a message.
    #[must_use]
    pub fn admits(&self, message: &ChatMessage) -> bool {
        if message.timestamp > self.timestamp {
            return true;
        }
        match (self.seq, message.seq) {
            (Some(seen), Some(seq)) => seq > seen,
            _ => false,
        }
    }

    /// Keep the messages beyond the watermark, in the order given.
    #[must_use]
    pub fn select_newer(&self, batch: Vec<ChatMessage>) -> Vec<ChatMessage> {
        batch.into_iter().filter(|m| self.admits(m)).collect()
    }

    /// Move the watermark up to `message`. The timestamp never moves
    /// backwards; `seq` follows the newest message, even when it restarted
    /// lower.
    pub fn advance_to(&mut self, message: &ChatMessage) {
        if message.timestamp > self.timestamp {
            self.timestamp = message.timestamp;
            self.seq = message.seq;
        } else if message.timestamp == self.timestamp {
            if let Some(seq) = message.seq {
                if self.seq.is_none_or(|seen| seq > seen) {
                    self.seq = Some(seq);
                }
            }
        }
    }
}

/// One joined room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSubscription {
    pub room_id: String,
    pub watermark: Watermark,
}

impl RoomSubscription {
    /// Subscription whose watermark starts at the current instant, so only
    /// messages posted after the join are surfaced by polling.
    #[must_use]
    pub fn starting_now(room_id: &str) -> Self {
        Self { room_id: room_id.to_owned(), watermark: Watermark::now() }
    }
}

#[cfg(test)]
#[path = "subscription_test.rs"]
mod tests;
