//! Room invitations.
//!
//! An invite binds a random key to one invitee and one room. Only the
//! invitee can redeem it, and redeeming does not consume it.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::backend::error::StoreError;
use crate::shared::{InviteKey, Principal, RoomId};

#[async_trait]
pub trait InviteStore: Send + Sync {
    /// Record an invitation of `invitee` to `room_id`
    async fn create_invite(
        &self,
        room_id: &RoomId,
        invitee: &Principal,
    ) -> Result<InviteKey, StoreError>;

    /// Room the key invites `user` to, if any
    async fn lookup(&self, key: &InviteKey, user: &Principal) -> Result<Option<RoomId>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryInviteStore {
    invites: RwLock<HashMap<(InviteKey, Principal), RoomId>>,
}

impl MemoryInviteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InviteStore for MemoryInviteStore {
    async fn create_invite(
        &self,
        room_id: &RoomId,
        invitee: &Principal,
    ) -> Result<InviteKey, StoreError> {
        let key = InviteKey::generate();
        self.invites
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((key.clone(), invitee.clone()), room_id.clone());
        Ok(key)
    }

    async fn lookup(&self, key: &InviteKey, user: &Principal) -> Result<Option<RoomId>, StoreError> {
        Ok(self
            .invites
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(key.clone(), user.clone()))
            .cloned())
    }
}
