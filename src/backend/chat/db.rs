/**
 * PostgreSQL Chat Stores
 *
 * Durable implementations of the room registry, invite store and history
 * store. Tables are created by the migrations in `migrations/`.
 *
 * History ordering comes from the `seq` BIGSERIAL column, so messages are
 * listed in the order the database accepted them regardless of their
 * timestamps.
 */

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::history::HistoryStore;
use super::invites::InviteStore;
use super::rooms::RoomRegistry;
use crate::backend::error::StoreError;
use crate::shared::{InviteKey, Message, Principal, RoomId};

/// Room registry backed by `chat_rooms` and `chat_room_members`
#[derive(Debug, Clone)]
pub struct PgRoomRegistry {
    pool: PgPool,
}

impl PgRoomRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRegistry for PgRoomRegistry {
    async fn create_room(&self) -> Result<RoomId, StoreError> {
        loop {
            let room_id = RoomId::generate();
            let result = sqlx::query(
                r#"
                INSERT INTO chat_rooms (room_id, created_at)
                VALUES ($1, NOW())
                ON CONFLICT (room_id) DO NOTHING
                "#,
            )
            .bind(room_id.as_str())
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                return Ok(room_id);
            }
        }
    }

    async fn room_exists(&self, room_id: &RoomId) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM chat_rooms WHERE room_id = $1)")
                .bind(room_id.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn ensure_room(&self, room_id: &RoomId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat_rooms (room_id, created_at)
            VALUES ($1, NOW())
            ON CONFLICT (room_id) DO NOTHING
            "#,
        )
        .bind(room_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_member(&self, user: &Principal, room_id: &RoomId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat_room_members (user_id, room_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, room_id) DO NOTHING
            "#,
        )
        .bind(user.as_str())
        .bind(room_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn rooms_for_user(&self, user: &Principal) -> Result<Vec<RoomId>, StoreError> {
        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT room_id
            FROM chat_room_members
            WHERE user_id = $1
            ORDER BY joined_seq ASC
            "#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|raw| RoomId::parse(raw).map_err(StoreError::from))
            .collect()
    }
}

/// Invite store backed by `chat_invites`
#[derive(Debug, Clone)]
pub struct PgInviteStore {
    pool: PgPool,
}

impl PgInviteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InviteStore for PgInviteStore {
    async fn create_invite(
        &self,
        room_id: &RoomId,
        invitee: &Principal,
    ) -> Result<InviteKey, StoreError> {
        let key = InviteKey::generate();
        sqlx::query(
            r#"
            INSERT INTO chat_invites (invite_key, user_id, room_id, created_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(key.as_str())
        .bind(invitee.as_str())
        .bind(room_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(key)
    }

    async fn lookup(&self, key: &InviteKey, user: &Principal) -> Result<Option<RoomId>, StoreError> {
        let room: Option<String> = sqlx::query_scalar(
            "SELECT room_id FROM chat_invites WHERE invite_key = $1 AND user_id = $2",
        )
        .bind(key.as_str())
        .bind(user.as_str())
        .fetch_optional(&self.pool)
        .await?;

        room.map(RoomId::parse).transpose().map_err(StoreError::from)
    }
}

/// History store backed by `chat_messages`
#[derive(Debug, Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load one stored message of a room by id
    pub async fn get(&self, room_id: &RoomId, id: &str) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, room_id, user_id, body, created_at, updated_at
            FROM chat_messages
            WHERE room_id = $1 AND id = $2
            "#,
        )
        .bind(room_id.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Message::try_from).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    room_id: String,
    user_id: String,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            room_id: RoomId::parse(row.room_id)?,
            user_id: row.user_id,
            body: row.body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, room_id: &RoomId, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, room_id, user_id, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&message.id)
        .bind(room_id.as_str())
        .bind(&message.user_id)
        .bind(&message.body)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list(&self, room_id: &RoomId) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, room_id, user_id, body, created_at, updated_at
            FROM chat_messages
            WHERE room_id = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(room_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }
}
