//! Polling chat sync client and the in-memory relay it talks to.
//!
//! SYSTEM CONTEXT
//! ==============
//! `client` replaces a realtime socket with periodic HTTP polling: join a
//! room, receive new messages as events, send and page history. `relay`
//! serves the matching REST contract. `wire` and `message` are the shared
//! JSON shapes.

pub mod client;
pub mod config;
pub mod events;
pub mod message;
pub mod relay;
pub mod wire;

pub use client::PollingSyncClient;
pub use client::api::{ApiError, HttpRoomApi, Identity, MessageQuery, RoomApi};
pub use config::{ClientConfig, ConfigError, RelayConfig};
pub use events::{ChatEvent, ErrorKind, EventBus, EventKind, HandlerId};
pub use message::{ActiveUser, ChatMessage, MessagePage, MessageType};
