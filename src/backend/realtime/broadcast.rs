/**
 * Room Broadcasting
 *
 * This module defines the fan-out seam of the relay: a `Broadcaster`
 * delivers each published message to every live subscriber of a room, and
 * a `Subscription` is one subscriber's receiving end.
 *
 * # Delivery
 *
 * Every subscriber present when `publish` is called gets a delivery attempt.
 * A recipient whose queue stays full for longer than the configured publish
 * timeout is skipped for that message; the publisher never waits on one
 * recipient longer than that.
 *
 * # Unsubscribing
 *
 * `Subscription::unsubscribe` is idempotent and also runs on drop, so every
 * exit path of a session releases its listener exactly once.
 */

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::backend::error::StoreError;
use crate::shared::{Message, RoomId};

/// Fan-out of room messages to live subscribers
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Register a new listener for `room_id`
    ///
    /// Messages published after this call returns are delivered to the
    /// returned subscription.
    async fn subscribe(&self, room_id: &RoomId) -> Result<Subscription, StoreError>;

    /// Deliver `message` to every current subscriber of `room_id`
    async fn publish(&self, room_id: &RoomId, message: &Message) -> Result<(), StoreError>;
}

type UnsubscribeFn = Box<dyn FnOnce() + Send>;

/// Receiving end of a room subscription
pub struct Subscription {
    room_id: RoomId,
    receiver: mpsc::Receiver<Message>,
    unsubscribe: Option<UnsubscribeFn>,
}

impl Subscription {
    /// Wrap a delivery queue and the cleanup that detaches it
    pub fn new(
        room_id: RoomId,
        receiver: mpsc::Receiver<Message>,
        unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            room_id,
            receiver,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Chain `cleanup` after the existing detach step
    ///
    /// Used by backends that layer their own bookkeeping over another
    /// broadcaster's subscription.
    pub fn on_unsubscribe(mut self, cleanup: impl FnOnce() + Send + 'static) -> Self {
        match self.unsubscribe.take() {
            Some(first) => {
                self.unsubscribe = Some(Box::new(move || {
                    first();
                    cleanup();
                }));
            }
            None => cleanup(),
        }
        self
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Wait for the next message
    ///
    /// Returns `None` once the subscription is detached and its queue drained,
    /// or when the backend stops feeding it.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Detach from the broadcaster; later calls are no-ops
    ///
    /// Messages already queued stay readable through [`Subscription::recv`].
    pub fn unsubscribe(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
            self.receiver.close();
            tracing::debug!(room_id = %self.room_id, "[Realtime] Subscription detached");
        }
    }

    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("room_id", &self.room_id)
            .field("active", &self.is_active())
            .finish()
    }
}
