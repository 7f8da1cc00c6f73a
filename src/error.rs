//! Error types for the log relay.

use thiserror::Error;

/// Errors raised while accepting submissions from producer processes.
///
/// Only [`RelayError::MalformedIdentity`] ever escapes [`crate::relay::LogRelay::submit`];
/// the transport variants stay inside the connection task that produced them.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Malformed producer identity: {0:?}")]
    MalformedIdentity(String),

    #[error("Relay transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Invalid relay frame: {0}")]
    InvalidFrame(String),
}

/// Top-level errors for configuration, logging setup and the binary.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::InvalidFrame(err.to_string())
    }
}
