//! Roomcast - Real-time Chat Rooms
//!
//! Roomcast relays chat messages between clients connected to the same
//! room. Each connection authenticates with a bearer token, joins one room,
//! and from then on every message it sends is recorded in the room's
//! history and broadcast to every other live connection in the room.
//!
//! # Module Structure
//!
//! - **`shared`** - Types usable without the server stack
//!   - Room, principal and message types
//!   - Clock abstraction
//!   - Configuration and validation errors
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Chat service and relay sessions
//!   - In-memory and PostgreSQL backends
//!   - JWT authentication
//!   - Axum HTTP/WebSocket routes and server bootstrap
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - Server modules and their dependencies
//!
//! # Usage
//!
//! ```rust,no_run
//! use roomcast::backend::server::{create_app, load_config};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config()?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let app = create_app(&config, shutdown_rx).await?;
//! let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

/// Shared types
pub mod shared;

/// Backend server code
#[cfg(feature = "ssr")]
pub mod backend;
