//! Chat message records exchanged with the relay.
//!
//! DESIGN
//! ======
//! The relay is the source of truth for ordering: it stamps every message
//! with an RFC 3339 timestamp and a per-room `seq`. Clients treat messages
//! as opaque records apart from those two fields, which drive the poll
//! watermark.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// =============================================================================
// MESSAGE TYPE
// =============================================================================

/// Tag describing how a message body should be rendered.
///
/// Unknown tags are preserved verbatim so a newer server can introduce
/// message kinds without breaking older clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    #[default]
    Text,
    Other(String),
}

impl MessageType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Other(tag) => tag,
        }
    }
}

impl From<String> for MessageType {
    fn from(tag: String) -> Self {
        if tag == "text" { Self::Text } else { Self::Other(tag) }
    }
}

impl From<&str> for MessageType {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_owned())
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Text => "text".to_owned(),
            MessageType::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// CHAT MESSAGE
// =============================================================================

/// A message as stored and returned by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    pub sender_name: String,
    /// Message text. Named `message` on the wire.
    #[serde(rename = "message")]
    pub body: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Per-room sequence number assigned by the relay. Absent when talking to
    /// a server that does not number messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

/// One page of room history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub has_more: bool,
}

/// Presence record for a user currently joined to a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUser {
    pub user_id: String,
    pub user_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_seen: OffsetDateTime,
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
