//! orbis-avplayer specific configuration
//!
//! Loaded from `avplayer.toml` in the Orbis configuration directory. Every
//! field has a built-in default, and a missing or malformed file is not fatal.

use orbis_common::config;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration file name inside the Orbis configuration directory
pub const CONFIG_FILE_NAME: &str = "avplayer.toml";

/// AvPlayer library configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AvPlayerConfig {
    /// Decoded frames buffered per stream kind before decoders block
    pub frame_queue_depth: usize,

    /// Demuxed packets buffered per decoder before the demuxer blocks
    pub packet_queue_depth: usize,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for AvPlayerConfig {
    fn default() -> Self {
        Self {
            frame_queue_depth: 8,
            packet_queue_depth: 32,
            log_level: "info".to_string(),
        }
    }
}

impl AvPlayerConfig {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        config::config_dir().join(CONFIG_FILE_NAME)
    }

    /// Load configuration, falling back to defaults
    ///
    /// Queue depths of 0 are raised to 1.
    pub fn load(path: &Path) -> Self {
        let mut cfg: Self = config::load_toml_or_default(path);
        cfg.frame_queue_depth = cfg.frame_queue_depth.max(1);
        cfg.packet_queue_depth = cfg.packet_queue_depth.max(1);
        cfg
    }
}
