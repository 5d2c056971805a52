//! Route Configuration Module
//!
//! HTTP and WebSocket routes of the chat server.
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! ├── router.rs       - Router assembly
//! ├── chat_routes.rs  - JSON room, invite and history handlers
//! └── stream.rs       - WebSocket room streaming
//! ```
//!
//! # Error Responses
//!
//! Handlers return `ChatError`, rendered as `{"error": ..., "status": ...}`
//! with the matching status code.

/// Main router creation
pub mod router;

/// Room, invite and history handlers
pub mod chat_routes;

/// WebSocket streaming
pub mod stream;

pub use router::create_router;
