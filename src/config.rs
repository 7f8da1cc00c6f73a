//! Configuration System
//!
//! Layered configuration for the relay: built-in defaults, a user-level file,
//! workspace files, then `LOGRELAY__SECTION__KEY` environment overrides.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::bus::DEFAULT_SUBSCRIBER_CAPACITY;
use crate::logging::LoggingConfig;
use crate::relay::{SubmitPolicy, DEFAULT_MAX_PRODUCERS};
use crate::store::DEFAULT_CAPACITY;

mod facade;
mod sources;

pub use facade::ConfigLoader;

/// Worst-case encoded bytes per message character (a JSON `\uXXXX` escape).
pub const MAX_ENCODED_BYTES_PER_CHAR: usize = 6;

/// Frame bytes reserved for everything in a submit frame except the message.
pub const FRAME_OVERHEAD_BYTES: usize = 1024;

/// Socket file name inside the resolved runtime directory.
pub const SOCKET_FILE_NAME: &str = "logrelay.sock";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub relay: RelaySettings,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub bus: BusSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Relay endpoint and per-submission bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Unix socket path; resolved under the runtime directory when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    /// Close producer connections idle for this long.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Producer timestamps further than this from receipt time are replaced.
    #[serde(default = "default_max_clock_skew_ms")]
    pub max_clock_skew_ms: u64,

    /// Distinct producer ids remembered by the relay.
    #[serde(default = "default_max_producers")]
    pub max_producers: usize,
}

fn default_idle_timeout_ms() -> u64 {
    30_000
}

fn default_max_message_chars() -> usize {
    4096
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_max_clock_skew_ms() -> u64 {
    5 * 60 * 1000
}

fn default_max_producers() -> usize {
    DEFAULT_MAX_PRODUCERS
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            socket_path: None,
            idle_timeout_ms: default_idle_timeout_ms(),
            max_message_chars: default_max_message_chars(),
            max_frame_bytes: default_max_frame_bytes(),
            max_clock_skew_ms: default_max_clock_skew_ms(),
            max_producers: default_max_producers(),
        }
    }
}

impl RelaySettings {
    /// Configured socket path, or the platform runtime directory, or the temp dir.
    pub fn resolve_socket_path(&self) -> PathBuf {
        if let Some(path) = &self.socket_path {
            return path.clone();
        }
        let base = directories::ProjectDirs::from("", "", "logrelay")
            .and_then(|dirs| dirs.runtime_dir().map(|p| p.to_path_buf()))
            .unwrap_or_else(std::env::temp_dir);
        base.join(SOCKET_FILE_NAME)
    }

    pub fn submit_policy(&self) -> SubmitPolicy {
        SubmitPolicy {
            max_message_chars: self.max_message_chars,
            max_clock_skew_ms: self.max_clock_skew_ms,
            max_producers: self.max_producers,
        }
    }

    /// Smallest frame limit that fits a maximal message in any encoding.
    pub fn min_frame_bytes(&self) -> usize {
        self.max_message_chars
            .saturating_mul(MAX_ENCODED_BYTES_PER_CHAR)
            .saturating_add(FRAME_OVERHEAD_BYTES)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.idle_timeout_ms == 0 {
            errors.push(ValidationError::Relay(
                "idle_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_message_chars < 16 {
            errors.push(ValidationError::Relay(
                "max_message_chars must be at least 16".to_string(),
            ));
        }
        if self.max_frame_bytes < self.min_frame_bytes() {
            errors.push(ValidationError::Relay(format!(
                "max_frame_bytes ({}) must be at least {} to carry max_message_chars ({}) fully escaped",
                self.max_frame_bytes,
                self.min_frame_bytes(),
                self.max_message_chars
            )));
        }
        if self.max_producers == 0 {
            errors.push(ValidationError::Relay(
                "max_producers must be at least 1".to_string(),
            ));
        }
        if let Some(path) = &self.socket_path {
            if path.as_os_str().is_empty() {
                errors.push(ValidationError::Relay(
                    "socket_path cannot be empty".to_string(),
                ));
            }
        }
        errors
    }
}

/// Retention settings for the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_capacity")]
    pub capacity: usize,
}

fn default_store_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            capacity: default_store_capacity(),
        }
    }
}

/// Live bus settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusSettings {
    /// Lines queued per subscriber before new ones are dropped for it.
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

fn default_subscriber_capacity() -> usize {
    DEFAULT_SUBSCRIBER_CAPACITY
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            subscriber_capacity: default_subscriber_capacity(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Relay(String),
    Store(String),
    Bus(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Relay(msg) => write!(f, "Relay: {}", msg),
            ValidationError::Store(msg) => write!(f, "Store: {}", msg),
            ValidationError::Bus(msg) => write!(f, "Bus: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl RelayConfig {
    /// Validate the entire configuration, reporting every problem found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = self.relay.validate();

        if self.store.capacity == 0 {
            errors.push(ValidationError::Store(
                "capacity must be at least 1".to_string(),
            ));
        }
        if self.bus.subscriber_capacity == 0 {
            errors.push(ValidationError::Bus(
                "subscriber_capacity must be at least 1".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    #[cfg(unix)]
    pub fn server_settings(&self) -> crate::relay::server::ServerSettings {
        crate::relay::server::ServerSettings {
            idle_timeout: self.relay.idle_timeout(),
            max_frame_bytes: self.relay.max_frame_bytes,
        }
    }
}
