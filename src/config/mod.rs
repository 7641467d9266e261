//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `BOT_RELAY` prefix and
//! nested values are separated by double underscores.
//!
//! # Example
//!
//! ```no_run
//! use bot_relay::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {}", config.server.socket_addr().unwrap());
//! ```

mod bots;
mod error;
mod redis;
mod relay;
mod server;
mod upstream;

pub use bots::{BotAppConfig, BotsConfig};
pub use error::{ConfigError, ValidationError};
pub use redis::RedisConfig;
pub use relay::RelayConfig;
pub use server::{Environment, ServerConfig};
pub use upstream::UpstreamSettings;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment, logging)
    #[serde(default)]
    pub server: ServerConfig,

    /// Redis for the external-id bridge; in-memory when absent
    pub redis: Option<RedisConfig>,

    /// Knowledge-base chat service
    #[serde(default)]
    pub upstream: UpstreamSettings,

    /// Relay timings and texts
    #[serde(default)]
    pub relay: RelayConfig,

    /// Platform app credentials
    #[serde(default)]
    pub bots: BotsConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `BOT_RELAY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `BOT_RELAY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `BOT_RELAY__RELAY__LONG_POLL_WAIT_MS=4000` -> `relay.long_poll_wait_ms = 4000`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("BOT_RELAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        self.upstream.validate()?;
        self.relay.validate()?;
        self.bots.validate()?;

        if self.server.request_timeout() <= self.relay.long_poll_wait() {
            return Err(ValidationError::RequestTimeoutBelowLongPoll);
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
