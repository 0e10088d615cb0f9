//! Configuration directory resolution and TOML loading

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "ORBIS_CONFIG_DIR";

/// Name of the per-user configuration subdirectory
const APP_DIR_NAME: &str = "orbis";

/// Configuration directory resolution, in priority order:
/// 1. `ORBIS_CONFIG_DIR` environment variable
/// 2. OS-dependent user config directory (`<config>/orbis`)
/// 3. `./orbis_data` fallback
pub fn config_dir() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_DIR_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    default_config_dir()
}

/// Get OS-dependent default configuration directory
fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./orbis_data"))
}

/// Create the configuration directory if it does not exist yet
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::Config(format!("Failed to create config directory {}: {}", dir.display(), e))
        })?;
        debug!("Created config directory {}", dir.display());
    }
    Ok(dir)
}

/// Parse a TOML file into `T`
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    let value = toml::from_str(&content)?;
    Ok(value)
}

/// Parse a TOML file into `T`, falling back to `T::default()`
///
/// A missing or malformed file is not fatal: a warning is logged and the
/// built-in defaults are used.
pub fn load_toml_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        debug!("Config file {} not found, using defaults", path.display());
        return T::default();
    }

    match load_toml(path) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to load config file {}: {} (using defaults)", path.display(), e);
            T::default()
        }
    }
}
