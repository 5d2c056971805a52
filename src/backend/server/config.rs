/**
 * Server Configuration
 *
 * Loads the application configuration and connects the PostgreSQL backend.
 *
 * # Configuration Sources
 *
 * Defaults, then the TOML file named by `ROOMCAST_CONFIG` (if set), then
 * environment variables. See [`ChatConfig`] for the variable names.
 */

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use super::init::ServerError;
use crate::shared::config::CONFIG_FILE_ENV;
use crate::shared::{ChatConfig, ConfigError};

/// Load configuration from the optional file and the environment
pub fn load_config() -> Result<ChatConfig, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        tracing::info!(path = %path, "[Server] Loading configuration file");
    }
    ChatConfig::from_env()
}

/// Connect to PostgreSQL and apply the schema migrations
///
/// # Arguments
///
/// * `database_url` - Connection string for the chat database
///
/// # Errors
///
/// Connection and migration failures are returned to the caller; the
/// postgres backend does not start without its schema.
pub async fn connect_database(database_url: &str) -> Result<PgPool, ServerError> {
    tracing::info!("[Server] Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
        .map_err(|e| {
            tracing::error!("[Server] Failed to create database connection pool: {:?}", e);
            ServerError::Database(e)
        })?;

    tracing::info!("[Server] Running database migrations...");
    sqlx::migrate!().run(&pool).await.map_err(|e| {
        tracing::error!("[Server] Failed to run database migrations: {}", e);
        ServerError::Migration(e)
    })?;
    tracing::info!("[Server] Database ready");

    Ok(pool)
}
