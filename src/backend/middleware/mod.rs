//! Middleware Module
//!
//! Request processing shared by the HTTP handlers.
//!
//! - **`auth`** - `BearerToken` extractor (header or `?token=` query)

pub mod auth;

pub use auth::BearerToken;
