/**
 * Server Initialization
 *
 * Builds the backend selected by configuration, the chat service on top of
 * it, and the router.
 *
 * # Initialization Steps
 *
 * 1. Build the backend (in-memory, or PostgreSQL with migrations applied)
 * 2. Build the JWT authenticator and the chat service
 * 3. Start background pruning of the broadcaster's empty room entries
 * 4. Create the router
 */

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

use super::config::connect_database;
use super::state::AppState;
use crate::backend::auth::JwtAuthenticator;
use crate::backend::chat::{ChatBackend, ChatService};
use crate::backend::realtime::{LocalBroadcaster, PgBroadcaster};
use crate::backend::routes::create_router;
use crate::shared::{BackendKind, ChatConfig, ConfigError};

/// How often empty rooms are pruned from the broadcaster
const PRUNE_INTERVAL: Duration = Duration::from_secs(300);

/// Failures while starting the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Create and configure the Axum application
///
/// # Arguments
///
/// * `config` - Validated application configuration
/// * `shutdown` - Shutdown signal; live sessions end when it flips to `true`
///
/// # Returns
///
/// Router ready to be served
pub async fn create_app(
    config: &ChatConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<Router, ServerError> {
    config.validate()?;
    tracing::info!(backend = ?config.backend, "[Server] Initializing chat backend");

    let backend = match config.backend {
        BackendKind::Memory => {
            let broadcaster =
                LocalBroadcaster::new(config.subscriber_buffer, config.publish_timeout());
            let pruned = broadcaster.clone();
            spawn_room_pruner(move || pruned.prune_empty_rooms(), shutdown.clone());
            ChatBackend {
                broadcaster: Arc::new(broadcaster),
                ..ChatBackend::in_memory(config)
            }
        }
        BackendKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(ConfigError::MissingValue("database_url"))?;
            let pool = connect_database(url).await?;
            let broadcaster = PgBroadcaster::new(
                pool.clone(),
                config.subscriber_buffer,
                config.publish_timeout(),
            );
            let pruned = broadcaster.clone();
            spawn_room_pruner(move || pruned.prune_empty_rooms(), shutdown.clone());
            ChatBackend {
                broadcaster: Arc::new(broadcaster),
                ..ChatBackend::postgres(pool, config)
            }
        }
    };

    let service = ChatService::new(Arc::new(JwtAuthenticator::new(&config.jwt_secret)), backend)
        .with_auto_create_rooms(config.auto_create_rooms)
        .with_max_body_bytes(config.max_body_bytes);

    let app = create_router(AppState::new(service, shutdown));
    tracing::info!("[Server] Router configured");
    Ok(app)
}

/// Periodically drop broadcaster entries for rooms nobody is subscribed to
fn spawn_room_pruner<F>(prune: F, mut shutdown: watch::Receiver<bool>)
where
    F: Fn() -> usize + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let pruned = prune();
                    tracing::debug!(pruned, "[Realtime] Pruned empty rooms");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    });
}
