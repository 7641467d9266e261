//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid socket address: {0}")]
    InvalidSocketAddress(String),

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Invalid upstream URL format")]
    InvalidUpstreamUrl,

    #[error("Invalid relay timing: {0}")]
    InvalidRelayTiming(&'static str),

    #[error("Request timeout must exceed the long-poll wait")]
    RequestTimeoutBelowLongPoll,

    #[error("Encoding AES key for {0} must be 43 characters")]
    InvalidEncodingAesKey(&'static str),

    #[error("Customer service app needs a corp id and API secret")]
    MissingCustomerServiceSecret,
}
