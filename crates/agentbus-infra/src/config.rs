//! Configuration loader for agentbus.
//!
//! Reads `agentbus.toml` from the data directory (`~/.agentbus/` by default)
//! and deserializes it into [`AppConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use agentbus_types::config::AppConfig;
use serde::Serialize;

/// File name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "agentbus.toml";

/// Smallest accepted `bus.queue_warn_depth`.
const MIN_QUEUE_WARN_DEPTH: usize = 1;

/// Where the effective configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Parsed from the file.
    File,
    /// No file; defaults in effect.
    Missing,
    /// The file could not be read or parsed; defaults in effect.
    Invalid,
}

/// Effective configuration plus its provenance.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub source: ConfigSource,
    pub config: AppConfig,
}

/// Load configuration from `{data_dir}/agentbus.toml`.
///
/// - If the file does not exist, returns [`AppConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config with floors applied.
pub async fn load_config(data_dir: &Path) -> LoadedConfig {
    let path = crate::filesystem::config_path(data_dir);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No {CONFIG_FILE} found at {}, using defaults", path.display());
            return LoadedConfig {
                path,
                source: ConfigSource::Missing,
                config: AppConfig::default(),
            };
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return LoadedConfig {
                path,
                source: ConfigSource::Invalid,
                config: AppConfig::default(),
            };
        }
    };

    match parse_config(&content) {
        Ok(config) => LoadedConfig {
            path,
            source: ConfigSource::File,
            config,
        },
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            LoadedConfig {
                path,
                source: ConfigSource::Invalid,
                config: AppConfig::default(),
            }
        }
    }
}

/// Parse configuration text and apply floors.
pub fn parse_config(content: &str) -> Result<AppConfig, toml::de::Error> {
    let mut config: AppConfig = toml::from_str(content)?;
    if config.bus.queue_warn_depth < MIN_QUEUE_WARN_DEPTH {
        tracing::warn!(
            "bus.queue_warn_depth = {} is below the minimum, using {MIN_QUEUE_WARN_DEPTH}",
            config.bus.queue_warn_depth
        );
        config.bus.queue_warn_depth = MIN_QUEUE_WARN_DEPTH;
    }
    Ok(config)
}
