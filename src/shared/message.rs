/**
 * Chat Message Data Structures
 *
 * This module defines the identifiers and message records used by the
 * room relay: `RoomId`, `Principal`, `InviteKey`, the stored `Message`
 * and its wire form `EnrichedMessage`.
 *
 * Identifiers are validated newtypes. A `RoomId` doubles as a key in the
 * history store and as the suffix of a pub/sub channel name, so it is kept
 * short and restricted to `[A-Za-z0-9_-]`.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::shared::error::SharedError;

/// Longest accepted room identifier, in bytes
pub const MAX_ROOM_ID_LEN: usize = 48;

/// Identifier of a chat room
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Parse and validate a room identifier
    ///
    /// # Errors
    ///
    /// Returns a validation error if the id is empty, longer than
    /// [`MAX_ROOM_ID_LEN`] or contains characters other than ASCII
    /// alphanumerics, `-` and `_`.
    pub fn parse(raw: impl Into<String>) -> Result<Self, SharedError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(SharedError::validation("room_id", "room_id is required"));
        }
        if raw.len() > MAX_ROOM_ID_LEN {
            return Err(SharedError::validation(
                "room_id",
                format!("room_id must be at most {MAX_ROOM_ID_LEN} bytes"),
            ));
        }
        if !raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_') {
            return Err(SharedError::validation(
                "room_id",
                "room_id may only contain letters, digits, '-' and '_'",
            ));
        }
        Ok(Self(raw))
    }

    /// Allocate a fresh random room identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = SharedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated identity of a connected client
///
/// Resolved once from the bearer token when a request arrives and passed
/// explicitly to every operation that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    pub fn new(subject: impl Into<String>) -> Result<Self, SharedError> {
        let subject = subject.into();
        if subject.is_empty() {
            return Err(SharedError::validation("user_id", "user_id is required"));
        }
        Ok(Self(subject))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key handed out by an invitation, redeemed by the invited user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteKey(String);

impl InviteKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: impl Into<String>) -> Result<Self, SharedError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(SharedError::validation("invite_key", "invite_key is required"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InviteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single chat message recorded in a room's history
///
/// Once appended to a room's history a message is never modified;
/// `updated_at` always equals `created_at`.
///
/// # Example
/// ```rust
/// use roomcast::shared::{Message, Principal, RoomId};
///
/// let room = RoomId::parse("lobby").unwrap();
/// let user = Principal::new("alice").unwrap();
/// let message = Message::new(room, user, "hello".to_string(), chrono::Utc::now());
///
/// assert_eq!(message.created_at, message.updated_at);
/// assert!(!message.id.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique message id (random UUID)
    pub id: String,
    pub room_id: RoomId,
    pub user_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Create a new message stamped with `now`
    pub fn new(room_id: RoomId, user: Principal, body: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room_id,
            user_id: user.0,
            body,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Message as delivered to clients
///
/// Timestamps are Unix seconds, the representation streaming clients
/// already consume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnrichedMessage {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub body: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Message> for EnrichedMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            room_id: message.room_id.to_string(),
            user_id: message.user_id.clone(),
            body: message.body.clone(),
            created_at: message.created_at.timestamp(),
            updated_at: message.updated_at.timestamp(),
        }
    }
}

impl From<Message> for EnrichedMessage {
    fn from(message: Message) -> Self {
        Self::from(&message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_room_id_rejects_empty() {
        let err = RoomId::parse("").unwrap_err();
        assert!(err.to_string().contains("room_id is required"));
    }

    #[test]
    fn test_room_id_rejects_bad_characters() {
        assert!(RoomId::parse("room one").is_err());
        assert!(RoomId::parse("room:1").is_err());
        assert!(RoomId::parse("a".repeat(MAX_ROOM_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_generated_room_id_is_valid() {
        let id = RoomId::generate();
        assert_eq!(RoomId::parse(id.as_str()).unwrap(), id);
    }

    #[test]
    fn test_room_id_deserialization_validates() {
        let ok: Result<RoomId, _> = serde_json::from_str(r#""R1""#);
        assert_eq!(ok.unwrap().as_str(), "R1");

        let bad: Result<RoomId, _> = serde_json::from_str(r#""""#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_principal_rejects_empty() {
        assert!(Principal::new("").is_err());
        assert_eq!(Principal::new("alice").unwrap().as_str(), "alice");
    }

    #[test]
    fn test_message_new_sets_equal_timestamps() {
        let now = Utc::now();
        let message = Message::new(
            RoomId::parse("R1").unwrap(),
            Principal::new("alice").unwrap(),
            "hello".to_string(),
            now,
        );
        assert_eq!(message.created_at, now);
        assert_eq!(message.updated_at, now);
        assert_eq!(message.user_id, "alice");
        assert!(Uuid::parse_str(&message.id).is_ok());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let room = RoomId::parse("R1").unwrap();
        let user = Principal::new("alice").unwrap();
        let now = Utc::now();
        let a = Message::new(room.clone(), user.clone(), "x".to_string(), now);
        let b = Message::new(room, user, "x".to_string(), now);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_enriched_message_uses_unix_seconds() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let message = Message::new(
            RoomId::parse("R1").unwrap(),
            Principal::new("bob").unwrap(),
            "ping".to_string(),
            now,
        );
        let wire = EnrichedMessage::from(&message);
        assert_eq!(wire.created_at, now.timestamp());
        assert_eq!(wire.created_at, wire.updated_at);
        assert_eq!(wire.room_id, "R1");
    }

    proptest! {
        #[test]
        fn prop_valid_room_ids_round_trip(raw in "[A-Za-z0-9_-]{1,48}") {
            let id = RoomId::parse(raw.clone()).unwrap();
            prop_assert_eq!(id.as_str(), raw.as_str());
        }

        #[test]
        fn prop_room_ids_with_separators_rejected(prefix in "[a-z]{1,10}", suffix in "[a-z]{1,10}") {
            let raw = format!("{prefix}:{suffix}");
            prop_assert!(RoomId::parse(raw).is_err());
        }
    }
}
