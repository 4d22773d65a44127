//! Data directory layout.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "AGENTBUS_DATA_DIR";

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `AGENTBUS_DATA_DIR` environment variable
/// 2. `~/.agentbus`
/// 3. `./.agentbus` when no home directory is known
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".agentbus");
    }

    PathBuf::from(".agentbus")
}

/// Path of the configuration file inside `data_dir`.
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(crate::config::CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_data_dir_env_override() {
        // SAFETY: this is the only test in the crate that touches the variable.
        unsafe { std::env::set_var(DATA_DIR_ENV, "/tmp/agentbus-test-data") };
        let dir = resolve_data_dir();
        unsafe { std::env::remove_var(DATA_DIR_ENV) };
        assert_eq!(dir, PathBuf::from("/tmp/agentbus-test-data"));
    }

    #[test]
    fn test_config_path() {
        let path = config_path(Path::new("/data"));
        assert_eq!(path, PathBuf::from("/data/agentbus.toml"));
    }
}
