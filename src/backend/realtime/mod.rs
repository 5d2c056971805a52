//! Real-time Fan-out Module
//!
//! Delivers messages published in a room to every live subscriber of that
//! room. Two interchangeable backends sit behind the [`Broadcaster`] trait;
//! a deployment picks exactly one through configuration.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs       - Module exports and documentation
//! ├── broadcast.rs - Broadcaster trait and Subscription handle
//! ├── local.rs     - In-process fan-out over mpsc queues
//! └── postgres.rs  - Cross-process fan-out over LISTEN/NOTIFY
//! ```

/// Broadcaster trait and subscription handle
pub mod broadcast;

/// In-process broadcaster
pub mod local;

/// Postgres LISTEN/NOTIFY broadcaster
pub mod postgres;

pub use broadcast::{Broadcaster, Subscription};
pub use local::LocalBroadcaster;
pub use postgres::PgBroadcaster;
