//! Authentication Module
//!
//! The chat core never inspects credentials itself. It consumes a single
//! capability, [`Authenticator`], that turns a bearer token into a
//! [`Principal`] or fails with an [`AuthError`].
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs      - Authenticator trait and AuthError
//! └── sessions.rs - HS256 JWT implementation and token issuing
//! ```
//!
//! # Authentication Flow
//!
//! 1. The transport extracts the raw token (`Authorization: Bearer` header or
//!    `?token=` query parameter for WebSockets)
//! 2. `ChatService` calls `Authenticator::authenticate` exactly once per request
//! 3. The resulting `Principal` is threaded explicitly through the session

use async_trait::async_trait;
use thiserror::Error;

use crate::shared::Principal;

/// JWT token generation and validation
pub mod sessions;

pub use sessions::{create_token, Claims, JwtAuthenticator};

/// Reasons a token is rejected
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has no usable subject")]
    MissingSubject,
}

/// Capability that resolves bearer tokens to identities
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Verify `token` and return the identity it was issued to
    async fn authenticate(&self, token: &str) -> Result<Principal, AuthError>;
}
