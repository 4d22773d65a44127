//! Application state shared by CLI commands.

use std::path::PathBuf;

use agentbus_infra::config::{ConfigSource, LoadedConfig, load_config};
use agentbus_infra::filesystem::resolve_data_dir;
use agentbus_types::config::AppConfig;

/// Resolved data directory and the configuration loaded from it.
#[derive(Debug, Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub loaded: LoadedConfig,
}

impl AppState {
    /// Resolve the data directory and load `agentbus.toml` from it.
    ///
    /// The directory is not created: a missing directory just means defaults.
    pub async fn init() -> Self {
        let data_dir = resolve_data_dir();
        let loaded = load_config(&data_dir).await;
        Self { data_dir, loaded }
    }

    pub fn config(&self) -> &AppConfig {
        &self.loaded.config
    }

    /// True when `agentbus.toml` exists but could not be used.
    pub fn config_is_invalid(&self) -> bool {
        self.loaded.source == ConfigSource::Invalid
    }
}
