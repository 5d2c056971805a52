/**
 * Chat Service
 *
 * Entry point for every chat operation. Each call authenticates its bearer
 * token first; nothing else runs for a request that fails authentication.
 *
 * # Operations
 *
 * - `create_room` / `list_rooms` - room registry and membership
 * - `invite_user` / `join_room_by_invite` - invitations
 * - `history` - a room's message log, oldest first
 * - `join` / `stream_room` - live relay sessions; `join` is `admit` (checks
 *   only) followed by `open_session` (subscribes)
 *
 * Backend failures are logged and surfaced as `ChatError::Internal`.
 */

use std::future::Future;
use std::sync::Arc;

use super::history::{HistoryStore, MemoryHistoryStore};
use super::invites::{InviteStore, MemoryInviteStore};
use super::rooms::{MemoryRoomRegistry, RoomRegistry};
use super::session::RoomSession;
use super::stream::{InboundStream, OutboundSink};
use crate::backend::auth::Authenticator;
use crate::backend::error::ChatError;
use crate::backend::realtime::{Broadcaster, LocalBroadcaster};
use crate::shared::config::DEFAULT_MAX_BODY_BYTES;
use crate::shared::{ChatConfig, Clock, InviteKey, Message, Principal, RoomId, SystemClock};

/// Storage and fan-out backends used by one deployment
#[derive(Clone)]
pub struct ChatBackend {
    pub registry: Arc<dyn RoomRegistry>,
    pub invites: Arc<dyn InviteStore>,
    pub history: Arc<dyn HistoryStore>,
    pub broadcaster: Arc<dyn Broadcaster>,
}

impl ChatBackend {
    /// Process-local backend
    pub fn in_memory(config: &ChatConfig) -> Self {
        Self {
            registry: Arc::new(MemoryRoomRegistry::new()),
            invites: Arc::new(MemoryInviteStore::new()),
            history: Arc::new(MemoryHistoryStore::new()),
            broadcaster: Arc::new(LocalBroadcaster::new(
                config.subscriber_buffer,
                config.publish_timeout(),
            )),
        }
    }

    /// Backend shared by every server connected to the same database
    pub fn postgres(pool: sqlx::PgPool, config: &ChatConfig) -> Self {
        use super::db::{PgHistoryStore, PgInviteStore, PgRoomRegistry};
        use crate::backend::realtime::PgBroadcaster;

        Self {
            registry: Arc::new(PgRoomRegistry::new(pool.clone())),
            invites: Arc::new(PgInviteStore::new(pool.clone())),
            history: Arc::new(PgHistoryStore::new(pool.clone())),
            broadcaster: Arc::new(PgBroadcaster::new(
                pool,
                config.subscriber_buffer,
                config.publish_timeout(),
            )),
        }
    }
}

/// Chat operations over an injected authenticator and backend
#[derive(Clone)]
pub struct ChatService {
    authenticator: Arc<dyn Authenticator>,
    backend: ChatBackend,
    clock: Arc<dyn Clock>,
    auto_create_rooms: bool,
    max_body_bytes: usize,
}

impl ChatService {
    pub fn new(authenticator: Arc<dyn Authenticator>, backend: ChatBackend) -> Self {
        Self {
            authenticator,
            backend,
            clock: Arc::new(SystemClock),
            auto_create_rooms: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create unknown rooms on join instead of rejecting them
    pub fn with_auto_create_rooms(mut self, enabled: bool) -> Self {
        self.auto_create_rooms = enabled;
        self
    }

    /// Largest message body a session accepts, in bytes
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    async fn authenticate(&self, token: &str) -> Result<Principal, ChatError> {
        Ok(self.authenticator.authenticate(token).await?)
    }

    async fn require_room(&self, room_id: &RoomId) -> Result<(), ChatError> {
        let exists = self
            .backend
            .registry
            .room_exists(room_id)
            .await
            .map_err(|e| ChatError::internal("registry.room_exists", e))?;
        if exists {
            Ok(())
        } else {
            Err(ChatError::not_found("room not found"))
        }
    }

    /// Register a new room and add it to the creator's room list
    ///
    /// # Returns
    ///
    /// The new room's id
    pub async fn create_room(&self, token: &str) -> Result<RoomId, ChatError> {
        let user = self.authenticate(token).await?;
        let registry = &self.backend.registry;

        let room_id = registry
            .create_room()
            .await
            .map_err(|e| ChatError::internal("registry.create_room", e))?;
        registry
            .add_member(&user, &room_id)
            .await
            .map_err(|e| ChatError::internal("registry.add_member", e))?;

        tracing::info!(room_id = %room_id, user_id = %user, "[Chat] Room created");
        Ok(room_id)
    }

    /// Rooms the caller belongs to, in join order
    pub async fn list_rooms(&self, token: &str) -> Result<Vec<RoomId>, ChatError> {
        let user = self.authenticate(token).await?;
        self.backend
            .registry
            .rooms_for_user(&user)
            .await
            .map_err(|e| ChatError::internal("registry.rooms_for_user", e))
    }

    /// Invite `user_id` to an existing room
    ///
    /// # Arguments
    ///
    /// * `token` - Bearer token of the inviting user
    /// * `room_id` - Room to invite into
    /// * `user_id` - Identity of the invitee
    ///
    /// # Returns
    ///
    /// The key the invitee redeems with [`ChatService::join_room_by_invite`]
    pub async fn invite_user(
        &self,
        token: &str,
        room_id: &str,
        user_id: &str,
    ) -> Result<InviteKey, ChatError> {
        let inviter = self.authenticate(token).await?;
        let room_id = RoomId::parse(room_id)?;
        let invitee = Principal::new(user_id)?;
        self.require_room(&room_id).await?;

        let key = self
            .backend
            .invites
            .create_invite(&room_id, &invitee)
            .await
            .map_err(|e| ChatError::internal("invites.create_invite", e))?;

        tracing::info!(
            room_id = %room_id,
            user_id = %inviter,
            invitee = %invitee,
            "[Chat] User invited"
        );
        Ok(key)
    }

    /// Redeem an invitation addressed to the caller
    pub async fn join_room_by_invite(
        &self,
        token: &str,
        invite_key: &str,
    ) -> Result<RoomId, ChatError> {
        let user = self.authenticate(token).await?;
        let key = InviteKey::parse(invite_key)?;

        let room_id = self
            .backend
            .invites
            .lookup(&key, &user)
            .await
            .map_err(|e| ChatError::internal("invites.lookup", e))?
            .ok_or_else(|| ChatError::not_found("user not invited"))?;

        self.backend
            .registry
            .add_member(&user, &room_id)
            .await
            .map_err(|e| ChatError::internal("registry.add_member", e))?;

        tracing::info!(room_id = %room_id, user_id = %user, "[Chat] Joined room by invite");
        Ok(room_id)
    }

    /// A room's messages, oldest first
    pub async fn history(&self, token: &str, room_id: &str) -> Result<Vec<Message>, ChatError> {
        self.authenticate(token).await?;
        let room_id = RoomId::parse(room_id)?;
        self.backend
            .history
            .list(&room_id)
            .await
            .map_err(|e| ChatError::internal("history.list", e))
    }

    /// Authenticate, resolve the room and subscribe to it
    ///
    /// The returned session is in the `Joining` state and holds a live
    /// subscription; messages published from here on reach it once it runs.
    pub async fn join(&self, token: &str, room_id: &str) -> Result<RoomSession, ChatError> {
        let (user, room_id) = self.admit(token, room_id).await?;
        self.open_session(user, room_id).await
    }

    /// Every check `join` makes, without subscribing
    ///
    /// # Returns
    ///
    /// The authenticated principal and the resolved room, ready for
    /// [`ChatService::open_session`]
    pub async fn admit(&self, token: &str, room_id: &str) -> Result<(Principal, RoomId), ChatError> {
        let user = self.authenticate(token).await?;
        let room_id = RoomId::parse(room_id)?;

        if self.auto_create_rooms {
            self.backend
                .registry
                .ensure_room(&room_id)
                .await
                .map_err(|e| ChatError::internal("registry.ensure_room", e))?;
        } else {
            self.require_room(&room_id).await?;
        }
        Ok((user, room_id))
    }

    /// Subscribe an admitted principal to a room
    pub async fn open_session(&self, user: Principal, room_id: RoomId) -> Result<RoomSession, ChatError> {
        let subscription = self
            .backend
            .broadcaster
            .subscribe(&room_id)
            .await
            .map_err(|e| ChatError::internal("broadcast.subscribe", e))?;

        tracing::info!(room_id = %room_id, user_id = %user, "[Chat] Session joining");
        Ok(RoomSession::new(
            user,
            subscription,
            self.backend.history.clone(),
            self.backend.broadcaster.clone(),
            self.clock.clone(),
        )
        .with_max_body_bytes(self.max_body_bytes))
    }

    /// Join a room and relay until the connection ends
    ///
    /// Cancellation before the session becomes active fails the join;
    /// afterwards it ends the session cleanly.
    pub async fn stream_room<I, O, C>(
        &self,
        token: &str,
        room_id: &str,
        inbound: I,
        outbound: O,
        cancel: C,
    ) -> Result<(), ChatError>
    where
        I: InboundStream,
        O: OutboundSink,
        C: Future<Output = ()> + Send,
    {
        tokio::pin!(cancel);

        let session = tokio::select! {
            biased;
            joined = self.join(token, room_id) => joined?,
            _ = &mut cancel => {
                tracing::debug!(room_id, "[Chat] Cancelled while joining");
                return Err(ChatError::Internal("session cancelled before joining".to_string()));
            }
        };

        session.run(inbound, outbound, cancel).await
    }
}
