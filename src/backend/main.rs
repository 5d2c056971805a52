/**
 * Roomcast Server Entry Point
 *
 * Loads configuration, builds the app and serves it until Ctrl-C. On
 * shutdown the watch signal is flipped first so live WebSocket sessions
 * close before the listener stops.
 */

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = roomcast::backend::server::load_config()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = roomcast::backend::server::create_app(&config, shutdown_rx).await?;

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, backend = ?config.backend, "[Server] Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("[Server] Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("[Server] Shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
