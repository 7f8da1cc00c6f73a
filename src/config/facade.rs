//! Configuration loader combining every source.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use tracing::debug;

use super::sources::{global_file, workspace_file};
use super::RelayConfig;
use crate::error::ApiError;

/// Prefix for `LOGRELAY__SECTION__KEY` overrides.
const ENV_PREFIX: &str = "LOGRELAY";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence, lowest first:
    /// 1. Built-in defaults
    /// 2. User-level file (`$XDG_CONFIG_HOME/logrelay/config.toml`)
    /// 3. `config/config.toml` in the workspace
    /// 4. `config/{LOGRELAY_ENV}.toml` in the workspace
    /// 5. `LOGRELAY__SECTION__KEY` environment variables
    pub fn load(workspace_root: &Path) -> Result<RelayConfig, ApiError> {
        let builder = Config::builder();
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(Self::environment());
        Self::finish(builder.build()?)
    }

    /// Load from one explicit file, still honoring environment overrides.
    pub fn load_from_file(path: &Path) -> Result<RelayConfig, ApiError> {
        let settings = Config::builder()
            .add_source(File::from(path.to_path_buf()).required(true))
            .add_source(Self::environment())
            .build()?;
        Self::finish(settings)
    }

    /// Path of the user-level file, whether or not it exists.
    pub fn xdg_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
    }

    fn finish(settings: Config) -> Result<RelayConfig, ApiError> {
        let config: RelayConfig = settings.try_deserialize()?;
        config.validate().map_err(|errors| {
            let joined = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            ApiError::ConfigError(joined)
        })?;
        debug!(
            store_capacity = config.store.capacity,
            subscriber_capacity = config.bus.subscriber_capacity,
            "Configuration loaded"
        );
        Ok(config)
    }
}
