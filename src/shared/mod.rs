//! Shared Module
//!
//! Types used by every layer of the chat relay: identifiers, message
//! records, the clock abstraction, validation errors and configuration.
//! Nothing in here depends on the server stack, so the module is available
//! without the `ssr` feature.

/// Room, principal and message types
pub mod message;

/// Shared error types
pub mod error;

/// Time source for message timestamps
pub mod clock;

/// Application configuration
pub mod config;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BackendKind, ChatConfig, ChatConfigBuilder, ConfigError};
pub use error::SharedError;
pub use message::{EnrichedMessage, InviteKey, Message, Principal, RoomId};
