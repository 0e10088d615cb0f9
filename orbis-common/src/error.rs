//! Common error types for Orbis

use thiserror::Error;

/// Common result type for Orbis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Orbis libraries
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settings file could not be parsed
    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] toml::de::Error),

    /// Settings could not be serialized back to disk
    #[error("Settings write error: {0}")]
    SettingsWrite(#[from] toml::ser::Error),

    /// A symbol was registered twice under the same key
    #[error("Duplicate symbol: {0}")]
    DuplicateSymbol(String),
}
