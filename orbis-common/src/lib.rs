//! # Orbis Common Library
//!
//! Shared code for the Orbis HLE libraries including:
//! - Error types
//! - Configuration directory resolution
//! - Persistent key/value settings store
//! - Exported symbol table used to register guest-callable entry points

pub mod config;
pub mod error;
pub mod settings;
pub mod symbols;

pub use error::{Error, Result};
pub use settings::{SettingEntry, Settings};
pub use symbols::{SymbolKey, SymbolTable};
