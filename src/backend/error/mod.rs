//! Backend Error Module
//!
//! Error types surfaced by the chat service and its backends.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - ChatError and StoreError definitions
//! └── conversion.rs - IntoResponse implementation
//! ```
//!
//! `ChatError` is the only error the transport layer ever sees. Backend
//! failures (`StoreError`) are logged where they happen and collapsed into
//! `ChatError::Internal`.

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use conversion::not_found;
pub use types::{ChatError, StoreError, CLOSE_INTERNAL_ERROR, CLOSE_POLICY_VIOLATION};
