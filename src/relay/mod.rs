//! In-memory chat relay serving the `/api/chat-realtime` REST contract.
//!
//! SYSTEM CONTEXT
//! ==============
//! The relay is the server the polling client talks to. It keeps a bounded
//! message log and a presence table per room, both in memory. Nothing is
//! persisted across restarts.

pub mod routes;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::RelayState;

/// Relay routes with permissive CORS and request tracing.
pub fn app(state: RelayState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/chat-realtime/messages/{room_id}",
            get(routes::get_messages).post(routes::post_message),
        )
        .route("/api/chat-realtime/rooms/{room_id}/join", post(routes::join_room))
        .route("/api/chat-realtime/rooms/{room_id}/leave", post(routes::leave_room))
        .route("/api/chat-realtime/rooms/{room_id}/users", get(routes::room_users))
        .route("/api/chat-realtime/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the relay on an already bound listener until the future is dropped.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(listener: TcpListener, state: RelayState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "chat relay listening");
    }
    axum::serve(listener, app(state)).await
}
