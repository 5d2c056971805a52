/**
 * Application State
 *
 * Shared by every request handler. Holds the chat service and the server's
 * shutdown signal, which live WebSocket sessions use as their cancel
 * future.
 *
 * # State Extraction
 *
 * `FromRef` lets handlers extract `ChatService` directly with
 * `State<ChatService>` instead of taking the whole `AppState`.
 */

use axum::extract::FromRef;
use std::future::Future;
use tokio::sync::watch;

use crate::backend::chat::ChatService;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: ChatService,
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    /// # Arguments
    ///
    /// * `service` - Chat service used by every route
    /// * `shutdown` - Flips to `true` when the server begins shutting down
    pub fn new(service: ChatService, shutdown: watch::Receiver<bool>) -> Self {
        Self { service, shutdown }
    }

    /// Future that resolves once shutdown has been requested
    ///
    /// If the shutdown sender is dropped without signalling, the future
    /// never resolves.
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut shutdown = self.shutdown.clone();
        async move {
            if shutdown.wait_for(|stop| *stop).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl FromRef<AppState> for ChatService {
    fn from_ref(state: &AppState) -> Self {
        state.service.clone()
    }
}
