//! Server Module
//!
//! Application state, configuration loading and app construction.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs    - Module exports and documentation
//! ├── state.rs  - AppState and FromRef implementations
//! ├── config.rs - Configuration loading and database connection
//! └── init.rs   - Backend selection and app creation
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use roomcast::backend::server::{create_app, load_config};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config()?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let app = create_app(&config, shutdown_rx).await?;
//! # Ok(())
//! # }
//! ```

/// Application state management
pub mod state;

/// Configuration loading and database connection
pub mod config;

/// Server initialization
pub mod init;

pub use config::{connect_database, load_config};
pub use init::{create_app, ServerError};
pub use state::AppState;
