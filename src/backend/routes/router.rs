/**
 * Router Configuration
 *
 * Assembles every route into a single Axum router.
 *
 * # Routes
 *
 * - `GET /health` - Liveness check
 * - `POST /rooms`, `GET /rooms` - Room creation and listing
 * - `POST /rooms/{room_id}/invites` - Invitations
 * - `POST /invites/{invite_key}/join` - Invitation redemption
 * - `GET /rooms/{room_id}/history` - Room history
 * - `GET /rooms/{room_id}/stream` - WebSocket relay
 *
 * Unknown paths get the JSON 404 fallback. Every request is traced with
 * `TraceLayer`.
 */

use axum::{routing::get, routing::post, Router};
use tower_http::trace::TraceLayer;

use super::{chat_routes, stream};
use crate::backend::error::not_found;
use crate::backend::server::AppState;

/// Create the Axum router with all routes configured
///
/// # Arguments
///
/// * `app_state` - Application state shared by the handlers
///
/// # Returns
///
/// Router with its state applied, ready to serve
pub fn create_router(app_state: AppState) -> Router<()> {
    Router::new()
        .route("/health", get(health))
        .route(
            "/rooms",
            post(chat_routes::create_room).get(chat_routes::list_rooms),
        )
        .route("/rooms/{room_id}/invites", post(chat_routes::invite_user))
        .route("/invites/{invite_key}/join", post(chat_routes::join_by_invite))
        .route("/rooms/{room_id}/history", get(chat_routes::room_history))
        .route("/rooms/{room_id}/stream", get(stream::stream_room))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health() -> &'static str {
    "ok"
}
