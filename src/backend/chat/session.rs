/**
 * Room Session
 *
 * One client's participation in one room for the life of one connection.
 *
 * # Lifecycle
 *
 * ```text
 * Joining ──run()──> Active ──(inbound ends | outbound fails | cancel | error)──> Draining ──> Closed
 * ```
 *
 * - **Joining**: the principal is authenticated, the room is known and the
 *   broadcast subscription exists. Nothing is relayed yet.
 * - **Active**: the inbound path (client → history → broadcast) and the
 *   outbound path (broadcast → client) are polled concurrently.
 * - **Draining**: the first path to finish, or the cancel signal, ends both.
 *   The subscription is released and the outbound sink closed, once.
 * - **Closed**: terminal. `run` consumes the session, so it cannot be reused.
 *
 * Every inbound message is appended to history before it is published, so a
 * history read never misses a message that has already been broadcast.
 * Empty bodies and bodies over the size limit are dropped before either
 * step, identically for every backend.
 */

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use super::history::HistoryStore;
use super::stream::{InboundStream, OutboundSink};
use crate::backend::error::ChatError;
use crate::backend::realtime::{Broadcaster, Subscription};
use crate::shared::config::DEFAULT_MAX_BODY_BYTES;
use crate::shared::{Clock, EnrichedMessage, Message, Principal, RoomId};

/// Lifecycle state of a [`RoomSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Joining,
    Active,
    Draining,
    Closed,
}

/// A joined, not yet running room session
pub struct RoomSession {
    room_id: RoomId,
    principal: Principal,
    subscription: Subscription,
    history: Arc<dyn HistoryStore>,
    broadcaster: Arc<dyn Broadcaster>,
    clock: Arc<dyn Clock>,
    max_body_bytes: usize,
    state: watch::Sender<SessionState>,
}

impl RoomSession {
    /// Assemble a session in the `Joining` state
    ///
    /// # Arguments
    ///
    /// * `principal` - Authenticated user owning the session
    /// * `subscription` - Live subscription to `subscription.room_id()`
    /// * `history` - Store every inbound message is appended to
    /// * `broadcaster` - Fan-out the inbound messages are published through
    /// * `clock` - Source of message timestamps
    pub fn new(
        principal: Principal,
        subscription: Subscription,
        history: Arc<dyn HistoryStore>,
        broadcaster: Arc<dyn Broadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Joining);
        Self {
            room_id: subscription.room_id().clone(),
            principal,
            subscription,
            history,
            broadcaster,
            clock,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            state,
        }
    }

    /// Drop inbound bodies longer than `limit` bytes
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Watch the session's lifecycle state
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Relay messages until either side ends or `cancel` resolves
    ///
    /// A peer closing its side, a failed send to the client and the cancel
    /// signal all end the session with `Ok(())`. A history or broadcast
    /// failure ends it with `ChatError::Internal`. In every case the
    /// subscription is released and `outbound` is closed before returning.
    pub async fn run<I, O, C>(self, mut inbound: I, mut outbound: O, cancel: C) -> Result<(), ChatError>
    where
        I: InboundStream,
        O: OutboundSink,
        C: Future<Output = ()> + Send,
    {
        let RoomSession {
            room_id,
            principal,
            mut subscription,
            history,
            broadcaster,
            clock,
            max_body_bytes,
            state,
        } = self;

        state.send_replace(SessionState::Active);
        tracing::info!(room_id = %room_id, user_id = %principal, "[Chat] Session active");

        let inbound_path = relay_inbound(
            &room_id,
            &principal,
            history.as_ref(),
            broadcaster.as_ref(),
            clock.as_ref(),
            max_body_bytes,
            &mut inbound,
        );
        let outbound_path = relay_outbound(&mut subscription, &mut outbound);

        let result = tokio::select! {
            result = inbound_path => result,
            result = outbound_path => result,
            _ = cancel => {
                tracing::debug!(room_id = %room_id, user_id = %principal, "[Chat] Session cancelled");
                Ok(())
            }
        };

        state.send_replace(SessionState::Draining);
        subscription.unsubscribe();
        if let Err(e) = outbound.close().await {
            tracing::debug!(room_id = %room_id, error = %e, "[Chat] Outbound close failed");
        }
        state.send_replace(SessionState::Closed);

        match &result {
            Ok(()) => {
                tracing::info!(room_id = %room_id, user_id = %principal, "[Chat] Session closed")
            }
            Err(e) => tracing::warn!(
                room_id = %room_id,
                user_id = %principal,
                error = %e,
                "[Chat] Session closed with error"
            ),
        }
        result
    }
}

impl std::fmt::Debug for RoomSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomSession")
            .field("room_id", &self.room_id)
            .field("principal", &self.principal)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

/// Client → history → broadcast
async fn relay_inbound<I: InboundStream>(
    room_id: &RoomId,
    principal: &Principal,
    history: &dyn HistoryStore,
    broadcaster: &dyn Broadcaster,
    clock: &dyn Clock,
    max_body_bytes: usize,
    inbound: &mut I,
) -> Result<(), ChatError> {
    loop {
        let body = match inbound.recv().await {
            Ok(Some(body)) => body,
            Ok(None) => {
                tracing::debug!(room_id = %room_id, user_id = %principal, "[Chat] Client closed stream");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(room_id = %room_id, user_id = %principal, error = %e, "[Chat] Client stream failed");
                return Ok(());
            }
        };

        if body.is_empty() {
            continue;
        }
        if body.len() > max_body_bytes {
            tracing::warn!(
                room_id = %room_id,
                user_id = %principal,
                bytes = body.len(),
                limit = max_body_bytes,
                "[Chat] Dropping oversized message"
            );
            continue;
        }

        let message = Message::new(room_id.clone(), principal.clone(), body, clock.now());
        history
            .append(room_id, &message)
            .await
            .map_err(|e| ChatError::internal("history.append", e))?;
        broadcaster
            .publish(room_id, &message)
            .await
            .map_err(|e| ChatError::internal("broadcast.publish", e))?;

        tracing::debug!(
            room_id = %room_id,
            user_id = %principal,
            message_id = %message.id,
            "[Chat] Message relayed"
        );
    }
}

/// Broadcast → client
async fn relay_outbound<O: OutboundSink>(
    subscription: &mut Subscription,
    outbound: &mut O,
) -> Result<(), ChatError> {
    loop {
        let Some(message) = subscription.recv().await else {
            return Err(ChatError::internal(
                "broadcast.recv",
                "broadcast subscription closed",
            ));
        };

        if let Err(e) = outbound.send(EnrichedMessage::from(message)).await {
            tracing::debug!(room_id = %subscription.room_id(), error = %e, "[Chat] Client send failed");
            return Ok(());
        }
    }
}
