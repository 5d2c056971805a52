//! Backend Module
//!
//! Server-side code for Roomcast: the chat service, its storage and fan-out
//! backends, authentication, and the Axum server around them.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs       - Module exports and documentation
//! ├── server/      - Configuration loading, state and app creation
//! ├── routes/      - HTTP and WebSocket routes
//! ├── chat/        - Rooms, invites, history, sessions, ChatService
//! ├── realtime/    - Broadcasters (in-process and LISTEN/NOTIFY)
//! ├── auth/        - Authenticator trait and JWT implementation
//! ├── middleware/  - Bearer token extraction
//! └── error/       - ChatError, StoreError and HTTP conversion
//! ```
//!
//! # Backends
//!
//! One backend runs per deployment, selected by `ROOMCAST_BACKEND`:
//!
//! - **`memory`** - everything in process; a single server
//! - **`postgres`** - tables for rooms, invites and history, and
//!   `LISTEN`/`NOTIFY` for fan-out, so several servers can share rooms
//!
//! # Thread Safety
//!
//! Collaborators are shared as `Arc<dyn Trait>`. The in-memory stores lock
//! per room and never hold a lock across an `.await`.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Chat rooms and relay sessions
pub mod chat;

/// Real-time fan-out
pub mod realtime;

/// Backend error types
pub mod error;

/// Authentication
pub mod auth;

/// Request extractors
pub mod middleware;

pub use chat::{ChatBackend, ChatService, RoomSession, SessionState};
pub use error::{ChatError, StoreError};
pub use server::create_app;
