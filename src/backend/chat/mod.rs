//! Chat Module
//!
//! Rooms, invitations, message history and the live relay sessions that
//! tie them to connected clients.
//!
//! # Module Structure
//!
//! ```text
//! chat/
//! ├── mod.rs      - Module exports
//! ├── rooms.rs    - RoomRegistry trait and in-memory registry
//! ├── invites.rs  - InviteStore trait and in-memory store
//! ├── history.rs  - HistoryStore trait and in-memory log
//! ├── db.rs       - PostgreSQL registry, invites and history
//! ├── stream.rs   - Client stream halves (InboundStream / OutboundSink)
//! ├── session.rs  - RoomSession relay state machine
//! └── service.rs  - ChatService orchestration
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use roomcast::backend::auth::JwtAuthenticator;
//! use roomcast::backend::chat::{ChatBackend, ChatService};
//! use roomcast::shared::ChatConfig;
//! use std::sync::Arc;
//!
//! # async fn example(token: &str) -> Result<(), roomcast::backend::error::ChatError> {
//! let config = ChatConfig::default();
//! let service = ChatService::new(
//!     Arc::new(JwtAuthenticator::new(&config.jwt_secret)),
//!     ChatBackend::in_memory(&config),
//! );
//! let room_id = service.create_room(token).await?;
//! let history = service.history(token, room_id.as_str()).await?;
//! # Ok(())
//! # }
//! ```

/// Room registry and membership
pub mod rooms;

/// Room invitations
pub mod invites;

/// Append-only message history
pub mod history;

/// PostgreSQL-backed stores
pub mod db;

/// Client stream adapters
pub mod stream;

/// Per-connection relay
pub mod session;

/// Chat service
pub mod service;

pub use db::{PgHistoryStore, PgInviteStore, PgRoomRegistry};
pub use history::{HistoryStore, MemoryHistoryStore};
pub use invites::{InviteStore, MemoryInviteStore};
pub use rooms::{MemoryRoomRegistry, RoomRegistry};
pub use service::{ChatBackend, ChatService};
pub use session::{RoomSession, SessionState};
pub use stream::{ChannelOutbound, InboundStream, OutboundSink, StreamError, StreamInbound};
