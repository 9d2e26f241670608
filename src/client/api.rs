//! Room API: the client's view of the relay's REST endpoints.
//!
//! DESIGN
//! ======
//! `RoomApi` is the seam between the polling client and the network. The
//! production implementation is `HttpRoomApi` (reqwest); tests substitute
//! scripted implementations.
//!
//! ERROR HANDLING
//! ==============
//! Every response body is inspected for the `success` discriminator before
//! the HTTP status: the relay reports validation failures as
//! `{"success": false, "message": ...}` with a 4xx status, and that message
//! is what callers should see. Only bodies that are not JSON fall back to the
//! bare status.

use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::HttpTimeouts;
use crate::message::{ActiveUser, ChatMessage, MessagePage, MessageType};
use crate::wire::{HealthResponse, JoinRequest, JoinResponse, LeaveRequest, LeaveResponse, SendRequest, SendResponse, UsersResponse};

const API_PREFIX: [&str; 2] = ["api", "chat-realtime"];

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The base URL cannot be joined with endpoint paths.
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    /// Transport-level failure: connect, timeout, body read.
    #[error("request failed: {0}")]
    Request(String),

    /// Non-success status with a body that is not a JSON envelope.
    #[error("server responded with status {status}")]
    Status { status: u16, body: String },

    /// The server answered `success: false`.
    #[error("{0}")]
    Rejected(String),

    /// The body could not be decoded into the expected shape.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// A query timestamp could not be rendered as RFC 3339.
    #[error("timestamp encode failed: {0}")]
    Encode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// Whether retrying the same request later might succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// Identity attached to outgoing requests. Unset fields go out as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinAck {
    pub active_users: usize,
}

/// Query for `GET messages/{room}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageQuery {
    pub limit: usize,
    pub before: Option<OffsetDateTime>,
    pub after: Option<OffsetDateTime>,
}

impl MessageQuery {
    /// History page ending before `before` (or the newest page).
    #[must_use]
    pub fn history(limit: usize, before: Option<OffsetDateTime>) -> Self {
        Self { limit, before, after: None }
    }

    /// Poll window starting at `after`.
    #[must_use]
    pub fn after(after: OffsetDateTime, limit: usize) -> Self {
        Self { limit, before: None, after: Some(after) }
    }

    pub(crate) fn to_pairs(&self) -> Result<Vec<(&'static str, String)>, ApiError> {
        let mut pairs = vec![("limit", self.limit.to_string())];
        if let Some(before) = self.before {
            pairs.push(("before", format_timestamp(before)?));
        }
        if let Some(after) = self.after {
            pairs.push(("after", format_timestamp(after)?));
        }
        Ok(pairs)
    }
}

pub(crate) fn format_timestamp(ts: OffsetDateTime) -> Result<String, ApiError> {
    ts.format(&Rfc3339)
        .map_err(|e| ApiError::Encode(e.to_string()))
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait RoomApi: Send + Sync {
    async fn join(&self, room_id: &str, identity: &Identity) -> Result<JoinAck, ApiError>;

    async fn leave(&self, room_id: &str, identity: &Identity) -> Result<(), ApiError>;

    async fn send(
        &self,
        room_id: &str,
        identity: &Identity,
        body: &str,
        message_type: &MessageType,
    ) -> Result<ChatMessage, ApiError>;

    async fn messages(&self, room_id: &str, query: &MessageQuery) -> Result<MessagePage, ApiError>;

    async fn active_users(&self, room_id: &str) -> Result<Vec<ActiveUser>, ApiError>;

    /// `Ok(false)` when the service answers but reports itself unhealthy.
    async fn health(&self) -> Result<bool, ApiError>;
}

// =============================================================================
// HTTP IMPLEMENTATION
// =============================================================================

pub struct HttpRoomApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRoomApi {
    /// # Errors
    ///
    /// Returns an error if the reqwest client cannot be built.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build `{base}/api/chat-realtime/{segments...}`, percent-encoding each
    /// segment so room ids cannot escape their path position.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.base_url).map_err(|_| ApiError::InvalidBaseUrl(self.base_url.clone()))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &impl Serialize,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        read_envelope(response, fallback).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
        fallback: &str,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        read_envelope(response, fallback).await
    }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response, fallback: &str) -> Result<T, ApiError> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| ApiError::Request(e.to_string()))?;
    decode_envelope(status, &text, fallback)
}

/// Decode a `{success, ...}` body. `fallback` is the error message used when
/// a failure body carries none.
pub(crate) fn decode_envelope<T: DeserializeOwned>(status: u16, text: &str, fallback: &str) -> Result<T, ApiError> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) if (200..300).contains(&status) => return Err(ApiError::Parse(e.to_string())),
        Err(_) => return Err(ApiError::Status { status, body: text.to_string() }),
    };
    if value.get("success").and_then(Value::as_bool) != Some(true) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback);
        return Err(ApiError::Rejected(message.to_string()));
    }
    serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))
}

#[async_trait::async_trait]
impl RoomApi for HttpRoomApi {
    async fn join(&self, room_id: &str, identity: &Identity) -> Result<JoinAck, ApiError> {
        let body = JoinRequest { user_id: identity.user_id.clone(), user_name: identity.user_name.clone() };
        let resp: JoinResponse = self
            .post_json(&["rooms", room_id, "join"], &body, "Failed to join room")
            .await?;
        Ok(JoinAck { active_users: resp.active_users.count() })
    }

    async fn leave(&self, room_id: &str, identity: &Identity) -> Result<(), ApiError> {
        let body = LeaveRequest { user_id: identity.user_id.clone() };
        let _: LeaveResponse = self
            .post_json(&["rooms", room_id, "leave"], &body, "Failed to leave room")
            .await?;
        Ok(())
    }

    async fn send(
        &self,
        room_id: &str,
        identity: &Identity,
        body: &str,
        message_type: &MessageType,
    ) -> Result<ChatMessage, ApiError> {
        let req = SendRequest {
            message: Some(body.to_owned()),
            sender_id: identity.user_id.clone(),
            sender_name: identity.user_name.clone(),
            message_type: Some(message_type.clone()),
        };
        let resp: SendResponse = self
            .post_json(&["messages", room_id], &req, "Failed to send message")
            .await?;
        Ok(resp.message)
    }

    async fn messages(&self, room_id: &str, query: &MessageQuery) -> Result<MessagePage, ApiError> {
        let pairs = query.to_pairs()?;
        self.get_json(&["messages", room_id], &pairs, "Failed to get messages")
            .await
    }

    async fn active_users(&self, room_id: &str) -> Result<Vec<ActiveUser>, ApiError> {
        let resp: UsersResponse = self
            .get_json(&["rooms", room_id, "users"], &[], "Failed to get active users")
            .await?;
        Ok(resp.active_users)
    }

    async fn health(&self) -> Result<bool, ApiError> {
        // A relay that answers with `success: false` is reachable but unhealthy.
        match self
            .get_json::<HealthResponse>(&["health"], &[], "Chat service unhealthy")
            .await
        {
            Ok(_) => Ok(true),
            Err(ApiError::Rejected(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
