/**
 * Backend Error Types
 *
 * This module defines the error taxonomy surfaced by the chat service and
 * the errors produced by its storage and fan-out backends.
 *
 * # Error Categories
 *
 * ## Service errors (`ChatError`)
 *
 * - `Unauthorized` - missing, malformed or expired bearer token
 * - `BadRequest` - malformed request, e.g. an empty room id
 * - `NotFound` - the room or invitation does not exist
 * - `Internal` - a history, registry or broadcast backend failed
 *
 * A peer closing its stream is not an error: the relay resolves to `Ok(())`.
 *
 * ## Backend errors (`StoreError`)
 *
 * Raised by `HistoryStore`, `RoomRegistry`, `InviteStore` and
 * `Broadcaster` implementations. The service logs the detail and converts
 * them into a single opaque `Internal` error for the caller.
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::auth::AuthError;
use crate::shared::SharedError;

/// Message returned to clients for every internal failure
pub const INTERNAL_MESSAGE: &str = "internal server error";

/// WebSocket close code for a session that ended because of a server failure
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// WebSocket close code for a policy violation (authentication)
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Errors surfaced by the chat service
///
/// # Usage
///
/// ```rust
/// use roomcast::backend::error::ChatError;
///
/// let err = ChatError::not_found("room does not exist");
/// assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Authentication failed or no credential was supplied
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The request was malformed
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The referenced room or invitation does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A storage or broadcast backend failed
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Log a backend failure and hide its detail from the caller
    ///
    /// # Arguments
    ///
    /// * `operation` - Name of the failed operation, used in the log line
    /// * `err` - The underlying backend error
    pub fn internal(operation: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!(operation, error = %err, "[Chat] Backend operation failed");
        Self::Internal(INTERNAL_MESSAGE.to_string())
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `Unauthorized` - 401 Unauthorized
    /// - `BadRequest` - 400 Bad Request
    /// - `NotFound` - 404 Not Found
    /// - `Internal` - 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// WebSocket close code used when a streaming session ends with this error
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Unauthorized(_) => CLOSE_POLICY_VIOLATION,
            _ => CLOSE_INTERNAL_ERROR,
        }
    }

    /// Get the error message without the variant prefix
    pub fn message(&self) -> String {
        match self {
            Self::Unauthorized(message)
            | Self::BadRequest(message)
            | Self::NotFound(message)
            | Self::Internal(message) => message.clone(),
        }
    }
}

impl From<SharedError> for ChatError {
    fn from(err: SharedError) -> Self {
        if err.is_validation() {
            Self::BadRequest(err.detail().to_string())
        } else {
            Self::internal("serialization", err)
        }
    }
}

impl From<AuthError> for ChatError {
    fn from(err: AuthError) -> Self {
        tracing::warn!(error = %err, "[Chat] Authentication failed");
        Self::Unauthorized("invalid token".to_string())
    }
}

/// Errors raised by storage and fan-out backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database rejected or failed a query
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored or published payload could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored record failed validation when read back
    #[error("invalid record: {0}")]
    InvalidRecord(#[from] SharedError),

    /// The backend was shut down
    #[error("backend closed: {0}")]
    Closed(String),
}

impl StoreError {
    pub fn closed(message: impl Into<String>) -> Self {
        Self::Closed(message.into())
    }
}
