/**
 * Chat Route Handlers
 *
 * JSON endpoints over `ChatService`. Every handler takes the caller's
 * bearer token and lets the service authenticate it.
 *
 * # Routes
 *
 * - `POST /rooms` - Create a room
 * - `GET /rooms` - List the caller's rooms
 * - `POST /rooms/{room_id}/invites` - Invite a user to a room
 * - `POST /invites/{invite_key}/join` - Redeem an invitation
 * - `GET /rooms/{room_id}/history` - Room history, oldest first
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::backend::chat::ChatService;
use crate::backend::error::ChatError;
use crate::backend::middleware::BearerToken;
use crate::shared::{EnrichedMessage, InviteKey, RoomId};

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomResponse {
    pub room_id: RoomId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteResponse {
    pub invite_key: InviteKey,
}

/// `POST /rooms`
pub async fn create_room(
    State(service): State<ChatService>,
    token: BearerToken,
) -> Result<(StatusCode, Json<RoomResponse>), ChatError> {
    let room_id = service.create_room(token.as_str()).await?;
    Ok((StatusCode::CREATED, Json(RoomResponse { room_id })))
}

/// `GET /rooms`
pub async fn list_rooms(
    State(service): State<ChatService>,
    token: BearerToken,
) -> Result<Json<RoomListResponse>, ChatError> {
    let rooms = service.list_rooms(token.as_str()).await?;
    Ok(Json(RoomListResponse { rooms }))
}

/// `POST /rooms/{room_id}/invites`
pub async fn invite_user(
    State(service): State<ChatService>,
    Path(room_id): Path<String>,
    token: BearerToken,
    Json(request): Json<InviteRequest>,
) -> Result<(StatusCode, Json<InviteResponse>), ChatError> {
    let invite_key = service
        .invite_user(token.as_str(), &room_id, &request.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(InviteResponse { invite_key })))
}

/// `POST /invites/{invite_key}/join`
pub async fn join_by_invite(
    State(service): State<ChatService>,
    Path(invite_key): Path<String>,
    token: BearerToken,
) -> Result<Json<RoomResponse>, ChatError> {
    let room_id = service
        .join_room_by_invite(token.as_str(), &invite_key)
        .await?;
    Ok(Json(RoomResponse { room_id }))
}

/// `GET /rooms/{room_id}/history`
pub async fn room_history(
    State(service): State<ChatService>,
    Path(room_id): Path<String>,
    token: BearerToken,
) -> Result<Json<Vec<EnrichedMessage>>, ChatError> {
    let history = service.history(token.as_str(), &room_id).await?;
    Ok(Json(history.iter().map(EnrichedMessage::from).collect()))
}
