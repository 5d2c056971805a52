//! Shared Error Types
//!
//! Errors raised while validating or (de)serializing the shared chat types.
//! The backend maps them onto its own error taxonomy: validation failures
//! become `BadRequest`, serialization failures become `Internal`.
//!
//! # Usage
//!
//! ```rust
//! use roomcast::shared::error::SharedError;
//!
//! let error = SharedError::validation("room_id", "room_id is required");
//! assert!(error.is_validation());
//! ```
use thiserror::Error;

/// Errors produced by the shared types
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// A request field failed validation
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError { .. })
    }

    /// Message without the variant prefix, suitable for clients
    pub fn detail(&self) -> &str {
        match self {
            Self::SerializationError { message } => message,
            Self::ValidationError { message, .. } => message,
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = SharedError::validation("room_id", "room_id is required");
        match &error {
            SharedError::ValidationError { field, message } => {
                assert_eq!(field, "room_id");
                assert_eq!(message, "room_id is required");
            }
            _ => panic!("Expected ValidationError"),
        }
        assert!(error.is_validation());
        assert_eq!(error.detail(), "room_id is required");
    }

    #[test]
    fn test_error_display() {
        let error = SharedError::serialization("bad payload");
        let display = format!("{}", error);
        assert!(display.contains("Serialization error"));
        assert!(display.contains("bad payload"));
        assert!(!error.is_validation());
    }

    #[test]
    fn test_from_serde_error() {
        let result: Result<serde_json::Value, _> = serde_json::from_str("{ invalid json }");
        let shared_error: SharedError = result.unwrap_err().into();

        match shared_error {
            SharedError::SerializationError { .. } => {}
            _ => panic!("Expected SerializationError from serde error"),
        }
    }
}
