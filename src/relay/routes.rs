//! Chat relay handlers for `/api/chat-realtime`.
//!
//! ERROR HANDLING
//! ==============
//! Every response is a `{"success": ...}` envelope. Validation failures,
//! including bodies Axum cannot decode, answer 400 with
//! `{"success": false, "message": ...}` so clients can surface the message.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

use super::state::{NewMessage, PageQuery, RelayState};
use crate::wire::{
    ActiveUsers, Envelope, Failure, HealthResponse, JoinRequest, JoinResponse, LeaveRequest, LeaveResponse,
    SendRequest, SendResponse, UsersResponse,
};

const SERVICE_STATUS: &str = "Chat service running";

fn ok<T: serde::Serialize>(body: T) -> Response {
    Json(Envelope::ok(body)).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(Failure::new(message))).into_response()
}

/// Trimmed value, or `None` when missing or blank.
pub(crate) fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

pub(crate) fn parse_timestamp(name: &str, raw: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339).map_err(|e| format!("invalid '{name}' timestamp: {e}"))
}

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl HistoryParams {
    pub(crate) fn to_query(&self, default_limit: usize) -> Result<PageQuery, String> {
        let limit = match self.limit.as_deref().map(str::trim) {
            None | Some("") => default_limit,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|e| format!("invalid 'limit': {e}"))?,
        };
        let before = self
            .before
            .as_deref()
            .map(|raw| parse_timestamp("before", raw))
            .transpose()?;
        let after = self
            .after
            .as_deref()
            .map(|raw| parse_timestamp("after", raw))
            .transpose()?;
        Ok(PageQuery { limit, before, after })
    }
}

/// `GET /api/chat-realtime/messages/{room_id}`: history page or poll window.
pub async fn get_messages(
    State(state): State<RelayState>,
    Path(room_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let query = match params.to_query(state.config.default_history_limit) {
        Ok(query) => query,
        Err(message) => return bad_request(message),
    };
    let page = state.store.read().await.page(&room_id, query);
    debug!(%room_id, count = page.messages.len(), has_more = page.has_more, "messages fetched");
    ok(page)
}

/// `POST /api/chat-realtime/messages/{room_id}`: append a message.
pub async fn post_message(
    State(state): State<RelayState>,
    Path(room_id): Path<String>,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = body else {
        return bad_request("Message, senderId, and senderName are required");
    };
    let (Some(body), Some(sender_id), Some(sender_name)) =
        (required(req.message), required(req.sender_id), required(req.sender_name))
    else {
        return bad_request("Message, senderId, and senderName are required");
    };

    let draft = NewMessage { sender_id, sender_name, body, message_type: req.message_type.unwrap_or_default() };
    let message = state.store.write().await.post(
        &room_id,
        draft,
        OffsetDateTime::now_utc(),
        state.config.room_message_cap,
    );
    debug!(%room_id, message_id = %message.id, seq = ?message.seq, "message stored");
    ok(SendResponse { message })
}

// =============================================================================
// ROOMS
// =============================================================================

/// `POST /api/chat-realtime/rooms/{room_id}/join`
pub async fn join_room(
    State(state): State<RelayState>,
    Path(room_id): Path<String>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> Response {
    let Ok(Json(req)) = body else {
        return bad_request("userId and userName are required");
    };
    let (Some(user_id), Some(user_name)) = (required(req.user_id), required(req.user_name)) else {
        return bad_request("userId and userName are required");
    };

    let users = state
        .store
        .write()
        .await
        .join(&room_id, &user_id, &user_name, OffsetDateTime::now_utc());
    info!(%room_id, %user_id, active = users.len(), "user joined room");
    ok(JoinResponse {
        message: Some("Successfully joined room".into()),
        room_id: Some(room_id),
        active_users: ActiveUsers::List(users),
    })
}

/// `POST /api/chat-realtime/rooms/{room_id}/leave`: succeeds even for
/// users that were never present.
pub async fn leave_room(
    State(state): State<RelayState>,
    Path(room_id): Path<String>,
    body: Result<Json<LeaveRequest>, JsonRejection>,
) -> Response {
    let user_id = body.ok().and_then(|Json(req)| required(req.user_id));
    if let Some(user_id) = user_id {
        let removed = state.store.write().await.leave(&room_id, &user_id);
        info!(%room_id, %user_id, removed, "user left room");
    }
    ok(LeaveResponse { message: Some("Successfully left room".into()) })
}

/// `GET /api/chat-realtime/rooms/{room_id}/users`
pub async fn room_users(State(state): State<RelayState>, Path(room_id): Path<String>) -> Response {
    let active_users = state.store.read().await.active_users(&room_id);
    let count = active_users.len();
    ok(UsersResponse { active_users, count })
}

/// `GET /api/chat-realtime/health`
pub async fn health(State(state): State<RelayState>) -> Response {
    let store = state.store.read().await;
    ok(HealthResponse {
        status: SERVICE_STATUS.into(),
        active_connections: store.active_connections(),
        active_rooms: store.active_rooms(),
        timestamp: Some(OffsetDateTime::now_utc()),
    })
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
