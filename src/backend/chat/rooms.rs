/**
 * Room Registry
 *
 * Owns the set of known rooms and each user's room list. Rooms are never
 * deleted. The in-memory registry keeps the room set and the membership
 * lists behind separate locks so membership updates never contend with
 * room lookups.
 */

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use crate::backend::error::StoreError;
use crate::shared::{Principal, RoomId};

/// Registry of rooms and room membership
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Allocate and record a new unique room
    async fn create_room(&self) -> Result<RoomId, StoreError>;

    async fn room_exists(&self, room_id: &RoomId) -> Result<bool, StoreError>;

    /// Record `room_id` if it is not known yet
    async fn ensure_room(&self, room_id: &RoomId) -> Result<(), StoreError>;

    /// Add a room to a user's room list; adding twice is a no-op
    async fn add_member(&self, user: &Principal, room_id: &RoomId) -> Result<(), StoreError>;

    /// Rooms the user belongs to, in the order they were added
    async fn rooms_for_user(&self, user: &Principal) -> Result<Vec<RoomId>, StoreError>;
}

/// Process-local room registry
#[derive(Debug, Default)]
pub struct MemoryRoomRegistry {
    rooms: RwLock<HashSet<RoomId>>,
    members: RwLock<HashMap<Principal, Vec<RoomId>>>,
}

impl MemoryRoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRegistry for MemoryRoomRegistry {
    async fn create_room(&self) -> Result<RoomId, StoreError> {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        loop {
            let room_id = RoomId::generate();
            if rooms.insert(room_id.clone()) {
                return Ok(room_id);
            }
        }
    }

    async fn room_exists(&self, room_id: &RoomId) -> Result<bool, StoreError> {
        Ok(self
            .rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(room_id))
    }

    async fn ensure_room(&self, room_id: &RoomId) -> Result<(), StoreError> {
        self.rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(room_id.clone());
        Ok(())
    }

    async fn add_member(&self, user: &Principal, room_id: &RoomId) -> Result<(), StoreError> {
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        let rooms = members.entry(user.clone()).or_default();
        if !rooms.contains(room_id) {
            rooms.push(room_id.clone());
        }
        Ok(())
    }

    async fn rooms_for_user(&self, user: &Principal) -> Result<Vec<RoomId>, StoreError> {
        Ok(self
            .members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn user(name: &str) -> Principal {
        Principal::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_create_room_is_unique_and_recorded() {
        let registry = MemoryRoomRegistry::new();
        let a = registry.create_room().await.unwrap();
        let b = registry.create_room().await.unwrap();

        assert_ne!(a, b);
        assert!(registry.room_exists(&a).await.unwrap());
        assert!(registry.room_exists(&b).await.unwrap());
        assert!(!registry.room_exists(&RoomId::parse("unknown").unwrap()).await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_room_is_idempotent() {
        let registry = MemoryRoomRegistry::new();
        let room_id = RoomId::parse("lobby").unwrap();
        registry.ensure_room(&room_id).await.unwrap();
        registry.ensure_room(&room_id).await.unwrap();
        assert!(registry.room_exists(&room_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_membership_keeps_order_without_duplicates() {
        let registry = MemoryRoomRegistry::new();
        let alice = user("alice");
        let r1 = RoomId::parse("R1").unwrap();
        let r2 = RoomId::parse("R2").unwrap();

        registry.add_member(&alice, &r1).await.unwrap();
        registry.add_member(&alice, &r2).await.unwrap();
        registry.add_member(&alice, &r1).await.unwrap();

        assert_eq!(registry.rooms_for_user(&alice).await.unwrap(), vec![r1, r2]);
        assert!(registry.rooms_for_user(&user("bob")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_creates() {
        let registry = Arc::new(MemoryRoomRegistry::new());
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create_room().await.unwrap() })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 32);
        for id in &ids {
            assert!(registry.room_exists(id).await.unwrap());
        }
    }
}
