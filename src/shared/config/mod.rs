//! Application configuration module
//!
//! Configuration is assembled in three layers: built-in defaults, an optional
//! TOML file named by `ROOMCAST_CONFIG`, then individual environment
//! variables. `ChatConfig::builder()` is available for programmatic setup.
//!
//! | Variable                      | Field               | Default  |
//! |-------------------------------|---------------------|----------|
//! | `SERVER_PORT`                 | `port`              | `3000`   |
//! | `ROOMCAST_BACKEND`            | `backend`           | `memory` |
//! | `DATABASE_URL`                | `database_url`      | unset    |
//! | `JWT_SECRET`                  | `jwt_secret`        | `secret` |
//! | `ROOMCAST_PUBLISH_TIMEOUT_MS` | `publish_timeout_ms`| `5000`   |
//! | `ROOMCAST_SUBSCRIBER_BUFFER`  | `subscriber_buffer` | `64`     |
//! | `ROOMCAST_AUTO_CREATE_ROOMS`  | `auto_create_rooms` | `false`  |
//! | `ROOMCAST_MAX_BODY_BYTES`     | `max_body_bytes`    | `4096`   |

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an optional TOML configuration file
pub const CONFIG_FILE_ENV: &str = "ROOMCAST_CONFIG";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_JWT_SECRET: &str = "secret";
const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Default limit on the size of one message body, in bytes
pub const DEFAULT_MAX_BODY_BYTES: usize = 4096;

/// Storage and fan-out backend used by a deployment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process rooms, history and broadcast; single server only
    #[default]
    Memory,
    /// Postgres tables for rooms/history and LISTEN/NOTIFY for fan-out
    Postgres,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::InvalidValue {
                key: "backend",
                value: other.to_string(),
            }),
        }
    }
}

/// Chat server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// TCP port the HTTP server listens on
    pub port: u16,
    pub backend: BackendKind,
    /// Postgres connection string, required by the postgres backend
    pub database_url: Option<String>,
    /// HMAC secret used to verify bearer tokens
    pub jwt_secret: String,
    /// Per-recipient delivery timeout for a single publish
    pub publish_timeout_ms: u64,
    /// Capacity of each subscriber's delivery queue
    pub subscriber_buffer: usize,
    /// Create unknown rooms on first stream join instead of rejecting them
    pub auto_create_rooms: bool,
    /// Largest message body accepted from a client, in bytes
    pub max_body_bytes: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            backend: BackendKind::Memory,
            database_url: None,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            publish_timeout_ms: DEFAULT_PUBLISH_TIMEOUT_MS,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            auto_create_rooms: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ChatConfig {
    /// Create a new ChatConfigBuilder
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::default()
    }

    /// Load configuration from the process environment
    ///
    /// Reads the TOML file named by `ROOMCAST_CONFIG` when set, then applies
    /// the individual environment overrides and validates the result.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        let config = base.with_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Apply environment-style overrides from `lookup`
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("SERVER_PORT") {
            self.port = parse_value("port", &port)?;
        }
        if let Some(backend) = lookup("ROOMCAST_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(secret) = lookup("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Some(timeout) = lookup("ROOMCAST_PUBLISH_TIMEOUT_MS") {
            self.publish_timeout_ms = parse_value("publish_timeout_ms", &timeout)?;
        }
        if let Some(buffer) = lookup("ROOMCAST_SUBSCRIBER_BUFFER") {
            self.subscriber_buffer = parse_value("subscriber_buffer", &buffer)?;
        }
        if let Some(flag) = lookup("ROOMCAST_AUTO_CREATE_ROOMS") {
            self.auto_create_rooms = parse_value("auto_create_rooms", &flag)?;
        }
        if let Some(limit) = lookup("ROOMCAST_MAX_BODY_BYTES") {
            self.max_body_bytes = parse_value("max_body_bytes", &limit)?;
        }
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == BackendKind::Postgres
            && self.database_url.as_deref().map_or(true, str::is_empty)
        {
            return Err(ConfigError::MissingValue("database_url"));
        }
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingValue("jwt_secret"));
        }
        if self.publish_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "publish_timeout_ms",
                value: "0".to_string(),
            });
        }
        if self.subscriber_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "subscriber_buffer",
                value: "0".to_string(),
            });
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_body_bytes",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

/// Builder for ChatConfig
#[derive(Debug, Default)]
pub struct ChatConfigBuilder {
    config: ChatConfig,
}

impl ChatConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = secret.into();
        self
    }

    pub fn publish_timeout(mut self, timeout: Duration) -> Self {
        self.config.publish_timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn subscriber_buffer(mut self, capacity: usize) -> Self {
        self.config.subscriber_buffer = capacity;
        self
    }

    pub fn auto_create_rooms(mut self, enabled: bool) -> Self {
        self.config.auto_create_rooms = enabled;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config.max_body_bytes = limit;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ChatConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}
