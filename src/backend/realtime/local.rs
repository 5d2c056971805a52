//! In-process broadcaster for single-server deployments.
//!
//! Each room owns its own subscriber table behind its own lock, so
//! subscribing to or publishing in one room never blocks another room. The
//! outer room map is locked only to find or insert a room entry. No lock is
//! held while a message is being delivered.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;

use super::broadcast::{Broadcaster, Subscription};
use crate::backend::error::StoreError;
use crate::shared::{Message, RoomId};

type SubscriberTable = RwLock<HashMap<u64, mpsc::Sender<Message>>>;

/// Broadcaster backed by per-subscriber `mpsc` queues
#[derive(Clone)]
pub struct LocalBroadcaster {
    rooms: Arc<RwLock<HashMap<RoomId, Arc<SubscriberTable>>>>,
    next_id: Arc<AtomicU64>,
    buffer: usize,
    publish_timeout: Duration,
}

impl LocalBroadcaster {
    /// # Arguments
    ///
    /// * `buffer` - Capacity of each subscriber's queue
    /// * `publish_timeout` - How long a publish waits on one full queue before skipping it
    pub fn new(buffer: usize, publish_timeout: Duration) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            buffer: buffer.max(1),
            publish_timeout,
        }
    }

    fn room_table(&self, room_id: &RoomId) -> Option<Arc<SubscriberTable>> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .cloned()
    }

    /// Number of live subscribers in a room
    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        self.room_table(room_id)
            .map(|table| table.read().unwrap_or_else(PoisonError::into_inner).len())
            .unwrap_or(0)
    }

    /// Drop room entries that no longer have subscribers
    pub fn prune_empty_rooms(&self) -> usize {
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
        let before = rooms.len();
        rooms.retain(|_, table| !table.read().unwrap_or_else(PoisonError::into_inner).is_empty());
        before - rooms.len()
    }
}

#[async_trait]
impl Broadcaster for LocalBroadcaster {
    async fn subscribe(&self, room_id: &RoomId) -> Result<Subscription, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);

        // Insert while holding the outer lock so pruning cannot remove the
        // room entry between lookup and insert.
        let existing = {
            let rooms = self.rooms.read().unwrap_or_else(PoisonError::into_inner);
            rooms.get(room_id).map(|table| {
                table
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(id, tx.clone());
                table.clone()
            })
        };
        let table = match existing {
            Some(table) => table,
            None => {
                let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
                let table = rooms.entry(room_id.clone()).or_default().clone();
                table.write().unwrap_or_else(PoisonError::into_inner).insert(id, tx);
                table
            }
        };

        tracing::debug!(room_id = %room_id, subscriber = id, "[Realtime] Subscribed");

        Ok(Subscription::new(room_id.clone(), rx, move || {
            table.write().unwrap_or_else(PoisonError::into_inner).remove(&id);
        }))
    }

    async fn publish(&self, room_id: &RoomId, message: &Message) -> Result<(), StoreError> {
        let Some(table) = self.room_table(room_id) else {
            tracing::debug!(room_id = %room_id, "[Realtime] No subscribers to receive message");
            return Ok(());
        };

        let recipients: Vec<(u64, mpsc::Sender<Message>)> = table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let timeout = self.publish_timeout;
        let deliveries = recipients.into_iter().map(|(id, tx)| {
            let message = message.clone();
            async move {
                match tokio::time::timeout(timeout, tx.send(message)).await {
                    Ok(Ok(())) => true,
                    // Receiver already gone; its unsubscribe is in flight.
                    Ok(Err(_)) => false,
                    Err(_) => {
                        tracing::warn!(
                            subscriber = id,
                            timeout_ms = timeout.as_millis() as u64,
                            "[Realtime] Subscriber too slow, skipping message"
                        );
                        false
                    }
                }
            }
        });

        let delivered = join_all(deliveries).await.into_iter().filter(|ok| *ok).count();
        tracing::debug!(room_id = %room_id, delivered, "[Realtime] Message broadcast");
        Ok(())
    }
}

impl std::fmt::Debug for LocalBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBroadcaster")
            .field("buffer", &self.buffer)
            .field("publish_timeout", &self.publish_timeout)
            .finish_non_exhaustive()
    }
}
