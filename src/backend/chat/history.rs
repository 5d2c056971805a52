/**
 * Room History
 *
 * Append-only per-room message log. Messages are returned oldest first, in
 * the order this store accepted them; a recorded message is never changed,
 * moved or removed.
 *
 * The in-memory store gives each room its own lock. The outer map is only
 * locked to find or create a room's log.
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::backend::error::StoreError;
use crate::shared::{Message, RoomId};

/// Append-only message log keyed by room
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Add a message to the tail of the room's log
    async fn append(&self, room_id: &RoomId, message: &Message) -> Result<(), StoreError>;

    /// Snapshot of the room's log, oldest first; empty for an unknown room
    async fn list(&self, room_id: &RoomId) -> Result<Vec<Message>, StoreError>;
}

type RoomLog = RwLock<Vec<Message>>;

#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    logs: RwLock<HashMap<RoomId, Arc<RoomLog>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self, room_id: &RoomId) -> Option<Arc<RoomLog>> {
        self.logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .cloned()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, room_id: &RoomId, message: &Message) -> Result<(), StoreError> {
        let log = match self.log(room_id) {
            Some(log) => log,
            None => self
                .logs
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(room_id.clone())
                .or_default()
                .clone(),
        };
        log.write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }

    async fn list(&self, room_id: &RoomId) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .log(room_id)
            .map(|log| log.read().unwrap_or_else(PoisonError::into_inner).clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Principal;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn message(room_id: &RoomId, body: &str) -> Message {
        Message::new(
            room_id.clone(),
            Principal::new("alice").unwrap(),
            body.to_string(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_list_unknown_room_is_empty() {
        let store = MemoryHistoryStore::new();
        let history = store.list(&RoomId::parse("R1").unwrap()).await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_append_preserves_insertion_order() {
        let store = MemoryHistoryStore::new();
        let r1 = RoomId::parse("R1").unwrap();
        let sent: Vec<Message> = ["one", "two", "three"]
            .iter()
            .map(|body| message(&r1, body))
            .collect();

        for m in &sent {
            store.append(&r1, m).await.unwrap();
        }

        assert_eq!(store.list(&r1).await.unwrap(), sent);
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let store = MemoryHistoryStore::new();
        let r1 = RoomId::parse("R1").unwrap();
        let r2 = RoomId::parse("R2").unwrap();
        store.append(&r1, &message(&r1, "hello")).await.unwrap();

        assert_eq!(store.list(&r1).await.unwrap().len(), 1);
        assert!(store.list(&r2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_not_affected_by_later_appends() {
        let store = MemoryHistoryStore::new();
        let r1 = RoomId::parse("R1").unwrap();
        store.append(&r1, &message(&r1, "first")).await.unwrap();

        let snapshot = store.list(&r1).await.unwrap();
        store.append(&r1, &message(&r1, "second")).await.unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.list(&r1).await.unwrap().len(), 2);
    }
}
