/**
 * Postgres Broadcaster
 *
 * Multi-process fan-out built on Postgres `LISTEN`/`NOTIFY`. Every server
 * connected to the same database sees every publish, so sessions for the
 * same room may live on different processes.
 *
 * # Channels
 *
 * Each room maps to the notification channel `room_publish:<room_id>`.
 * Publishing is `SELECT pg_notify(channel, payload)`.
 *
 * # Listening
 *
 * One listener task per process owns a single `PgListener` connection and
 * counts local subscribers per room. The first subscriber of a room issues
 * `LISTEN`, the last one leaving issues `UNLISTEN`. Notifications are handed
 * to a per-room dispatcher that delivers them through a [`LocalBroadcaster`],
 * so ordering within a room is kept and a slow room never holds up another.
 *
 * ```text
 * pg_notify ──> PgListener ──> room dispatcher ──> LocalBroadcaster ──> subscribers
 * ```
 *
 * # Payloads
 *
 * Postgres rejects notification payloads of 8000 bytes or more. A message
 * whose JSON form fits is sent inline; otherwise the notification carries
 * only its id and each dispatcher loads the stored row from `chat_messages`.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgListener, PgNotification, PgPool};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use super::broadcast::{Broadcaster, Subscription};
use super::local::LocalBroadcaster;
use crate::backend::chat::db::PgHistoryStore;
use crate::backend::error::StoreError;
use crate::shared::{Message, RoomId};

/// Prefix of every room notification channel
pub const CHANNEL_PREFIX: &str = "room_publish:";

/// Largest payload Postgres accepts for `NOTIFY`
pub const MAX_NOTIFY_PAYLOAD: usize = 7999;

/// Pause before the listener retries after losing its connection
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Notification channel name for a room
pub fn channel_name(room_id: &RoomId) -> String {
    format!("{CHANNEL_PREFIX}{room_id}")
}

/// Body of a room notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Notice {
    /// The full message
    Message(Message),
    /// A message too large to send inline; read it from history
    Stored { id: String },
}

/// Encode `message` as a notification payload that Postgres will accept
fn encode_notice(message: &Message) -> Result<String, StoreError> {
    let inline = serde_json::to_string(&Notice::Message(message.clone()))?;
    if inline.len() <= MAX_NOTIFY_PAYLOAD {
        return Ok(inline);
    }

    tracing::debug!(
        message_id = %message.id,
        bytes = inline.len(),
        "[Realtime] Payload too large to notify inline, sending reference"
    );
    Ok(serde_json::to_string(&Notice::Stored {
        id: message.id.clone(),
    })?)
}

enum Command {
    Listen {
        room_id: RoomId,
        ack: oneshot::Sender<Result<(), StoreError>>,
    },
    Unlisten(RoomId),
}

/// Broadcaster backed by Postgres notifications
#[derive(Clone)]
pub struct PgBroadcaster {
    pool: PgPool,
    local: LocalBroadcaster,
    commands: mpsc::UnboundedSender<Command>,
}

impl PgBroadcaster {
    /// Create the broadcaster and start its listener task
    ///
    /// Must be called inside a Tokio runtime. The listener connection is
    /// opened when the first room is subscribed to.
    ///
    /// # Arguments
    ///
    /// * `pool` - Pool used for `pg_notify`, the listener connection and history lookups
    /// * `buffer` - Capacity of each local subscriber's queue
    /// * `publish_timeout` - How long delivery waits on one full subscriber queue
    pub fn new(pool: PgPool, buffer: usize, publish_timeout: Duration) -> Self {
        let local = LocalBroadcaster::new(buffer, publish_timeout);
        let (commands, receiver) = mpsc::unbounded_channel();

        let task = ListenerTask {
            pool: pool.clone(),
            history: PgHistoryStore::new(pool.clone()),
            local: local.clone(),
            listener: None,
            rooms: HashMap::new(),
        };
        tokio::spawn(task.run(receiver));

        Self {
            pool,
            local,
            commands,
        }
    }

    /// Number of live subscribers to a room in this process
    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        self.local.subscriber_count(room_id)
    }

    /// Drop local entries for rooms with no subscribers left
    pub fn prune_empty_rooms(&self) -> usize {
        self.local.prune_empty_rooms()
    }

    fn stopped() -> StoreError {
        StoreError::closed("postgres listener stopped")
    }
}

#[async_trait]
impl Broadcaster for PgBroadcaster {
    async fn subscribe(&self, room_id: &RoomId) -> Result<Subscription, StoreError> {
        // Attach locally first so nothing dispatched after LISTEN is missed.
        let subscription = self.local.subscribe(room_id).await?;

        let (ack, confirmed) = oneshot::channel();
        self.commands
            .send(Command::Listen {
                room_id: room_id.clone(),
                ack,
            })
            .map_err(|_| Self::stopped())?;
        confirmed.await.map_err(|_| Self::stopped())??;

        let commands = self.commands.clone();
        let room = room_id.clone();
        Ok(subscription.on_unsubscribe(move || {
            let _ = commands.send(Command::Unlisten(room));
        }))
    }

    async fn publish(&self, room_id: &RoomId, message: &Message) -> Result<(), StoreError> {
        let payload = encode_notice(message)?;
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel_name(room_id))
            .bind(payload)
            .execute(&self.pool)
            .await?;

        tracing::debug!(room_id = %room_id, message_id = %message.id, "[Realtime] Notified");
        Ok(())
    }
}

impl std::fmt::Debug for PgBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgBroadcaster")
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

/// A room this process listens to
struct RoomFeed {
    subscribers: usize,
    dispatcher: mpsc::UnboundedSender<String>,
}

/// Owner of the process-wide listener connection
struct ListenerTask {
    pool: PgPool,
    history: PgHistoryStore,
    local: LocalBroadcaster,
    listener: Option<PgListener>,
    rooms: HashMap<RoomId, RoomFeed>,
}

impl ListenerTask {
    /// Serve listen requests and route notifications until the broadcaster is dropped
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Listen { room_id, ack }) => {
                        let result = self.listen(&room_id).await;
                        let listened = result.is_ok();
                        // The subscriber gave up waiting; undo its count.
                        if ack.send(result).is_err() && listened {
                            self.unlisten(&room_id).await;
                        }
                    }
                    Some(Command::Unlisten(room_id)) => self.unlisten(&room_id).await,
                    None => break,
                },
                notification = next_notification(&mut self.listener) => match notification {
                    Ok(notification) => self.route(notification),
                    Err(e) => {
                        tracing::error!(error = %e, "[Realtime] Listener connection failed, retrying");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                },
            }
        }

        tracing::debug!("[Realtime] Listener task stopped");
    }

    async fn listen(&mut self, room_id: &RoomId) -> Result<(), StoreError> {
        if let Some(feed) = self.rooms.get_mut(room_id) {
            feed.subscribers += 1;
            return Ok(());
        }

        if self.listener.is_none() {
            self.listener = Some(PgListener::connect_with(&self.pool).await?);
            tracing::info!("[Realtime] Listener connected");
        }
        let listener = self.listener.as_mut().ok_or_else(PgBroadcaster::stopped)?;
        let channel = channel_name(room_id);
        // LISTEN is confirmed before the subscriber is acknowledged, so no
        // publish made after subscribe() returns can be missed.
        listener.listen(&channel).await?;

        let (dispatcher, feed) = mpsc::unbounded_channel();
        tokio::spawn(dispatch_room(
            room_id.clone(),
            feed,
            self.local.clone(),
            self.history.clone(),
        ));
        self.rooms.insert(
            room_id.clone(),
            RoomFeed {
                subscribers: 1,
                dispatcher,
            },
        );

        tracing::debug!(room_id = %room_id, channel = %channel, "[Realtime] Listening");
        Ok(())
    }

    async fn unlisten(&mut self, room_id: &RoomId) {
        let Some(feed) = self.rooms.get_mut(room_id) else {
            return;
        };
        feed.subscribers = feed.subscribers.saturating_sub(1);
        if feed.subscribers > 0 {
            return;
        }

        // Dropping the feed lets the dispatcher drain and exit.
        self.rooms.remove(room_id);
        if let Some(listener) = self.listener.as_mut() {
            if let Err(e) = listener.unlisten(&channel_name(room_id)).await {
                tracing::warn!(room_id = %room_id, error = %e, "[Realtime] UNLISTEN failed");
            }
        }
        tracing::debug!(room_id = %room_id, "[Realtime] Stopped listening");
    }

    fn route(&self, notification: PgNotification) {
        let room_id = match notification
            .channel()
            .strip_prefix(CHANNEL_PREFIX)
            .map(RoomId::parse)
        {
            Some(Ok(room_id)) => room_id,
            _ => {
                tracing::warn!(channel = %notification.channel(), "[Realtime] Notification on unknown channel");
                return;
            }
        };

        // A notification can still arrive just after the last UNLISTEN.
        if let Some(feed) = self.rooms.get(&room_id) {
            let _ = feed.dispatcher.send(notification.payload().to_string());
        }
    }
}

async fn next_notification(listener: &mut Option<PgListener>) -> Result<PgNotification, sqlx::Error> {
    match listener {
        Some(listener) => listener.recv().await,
        None => std::future::pending().await,
    }
}

/// Deliver one room's notifications, in order, to its local subscribers
async fn dispatch_room(
    room_id: RoomId,
    mut feed: mpsc::UnboundedReceiver<String>,
    local: LocalBroadcaster,
    history: PgHistoryStore,
) {
    while let Some(payload) = feed.recv().await {
        let message = match serde_json::from_str::<Notice>(&payload) {
            Ok(Notice::Message(message)) => message,
            Ok(Notice::Stored { id }) => match history.get(&room_id, &id).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    tracing::warn!(room_id = %room_id, message_id = %id, "[Realtime] Notified message not in history");
                    continue;
                }
                Err(e) => {
                    tracing::error!(room_id = %room_id, message_id = %id, error = %e, "[Realtime] Failed to load notified message");
                    continue;
                }
            },
            Err(e) => {
                tracing::warn!(room_id = %room_id, error = %e, "[Realtime] Dropping malformed notification");
                continue;
            }
        };

        if let Err(e) = local.publish(&room_id, &message).await {
            tracing::warn!(room_id = %room_id, error = %e, "[Realtime] Local delivery failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Principal;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn message(body: String) -> Message {
        Message::new(
            RoomId::parse("R1").unwrap(),
            Principal::new("alice").unwrap(),
            body,
            Utc::now(),
        )
    }

    #[test]
    fn test_channel_name_fits_postgres_identifier_limit() {
        let room_id = RoomId::parse("a".repeat(crate::shared::message::MAX_ROOM_ID_LEN)).unwrap();
        let channel = channel_name(&room_id);
        assert!(channel.starts_with(CHANNEL_PREFIX));
        // NAMEDATALEN - 1
        assert!(channel.len() <= 63);
    }

    #[test]
    fn test_small_message_is_sent_inline() {
        let sent = message("hello".to_string());
        let payload = encode_notice(&sent).unwrap();

        assert_eq!(serde_json::from_str::<Notice>(&payload).unwrap(), Notice::Message(sent));
    }

    #[test]
    fn test_large_message_is_sent_by_reference() {
        let sent = message("x".repeat(8000));
        let payload = encode_notice(&sent).unwrap();

        assert!(payload.len() <= MAX_NOTIFY_PAYLOAD);
        assert_eq!(
            serde_json::from_str::<Notice>(&payload).unwrap(),
            Notice::Stored { id: sent.id }
        );
    }

    #[test]
    fn test_escaped_body_is_measured_after_encoding() {
        // 2000 control characters encode to 12000 bytes of JSON.
        let sent = message("\u{1}".repeat(2000));
        let payload = encode_notice(&sent).unwrap();

        assert_matches::assert_matches!(
            serde_json::from_str::<Notice>(&payload).unwrap(),
            Notice::Stored { .. }
        );
    }
}
