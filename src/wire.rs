//! JSON bodies of the `/api/chat-realtime` REST contract.
//!
//! Shared by the HTTP client (serialize requests, decode responses) and the
//! relay (decode requests, serialize responses). Request fields are optional
//! so the relay can answer missing values with a 400 instead of a generic
//! extractor rejection.

use serde::{Deserialize, Serialize};

use crate::message::{ActiveUser, ChatMessage, MessageType};

// =============================================================================
// REQUESTS
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub message: Option<String>,
    pub sender_id: Option<String>,
    pub sender_name: Option<String>,
    #[serde(default)]
    pub message_type: Option<MessageType>,
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Success wrapper: `{"success": true, ...body}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn ok(body: T) -> Self {
        Self { success: true, body }
    }
}

/// Failure body: `{"success": false, "message": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub success: bool,
    pub message: String,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

/// Servers report joined users either as a count or as presence records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActiveUsers {
    Count(usize),
    List(Vec<ActiveUser>),
}

impl ActiveUsers {
    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Count(n) => *n,
            Self::List(users) => users.len(),
        }
    }
}

impl Default for ActiveUsers {
    fn default() -> Self {
        Self::Count(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub active_users: ActiveUsers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersResponse {
    pub active_users: Vec<ActiveUser>,
    #[serde(default)]
    pub count: usize,
}

/// Relay health body. Older relays answer with a bare `{"success": true}`,
/// so every field is optional on the way in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub active_connections: usize,
    #[serde(default)]
    pub active_rooms: usize,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<time::OffsetDateTime>,
}

#[cfg(test)]
#[path = "wire_test.rs"]
mod tests;
