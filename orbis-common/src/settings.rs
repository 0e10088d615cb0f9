//! Persistent key/value settings store
//!
//! Values are addressed by a `(section, name)` pair and stored in a single
//! TOML document, one table per section. Every mutation is written back to
//! disk immediately so the file always reflects the in-memory state.

use crate::{config, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use toml::{Table, Value};
use tracing::{debug, warn};

/// Default settings file name inside the settings directory
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// A named settings entry with its default value
#[derive(Debug, Clone, PartialEq)]
pub struct SettingEntry {
    pub section: String,
    pub name: String,
    pub default: Value,
}

impl SettingEntry {
    pub fn new(section: &str, name: &str, default: impl Into<Value>) -> Self {
        Self {
            section: section.to_string(),
            name: name.to_string(),
            default: default.into(),
        }
    }
}

/// Persistent settings backed by a TOML file
#[derive(Debug)]
pub struct Settings {
    path: PathBuf,
    table: Mutex<Table>,
}

impl Settings {
    /// Open the default settings file in the configuration directory
    pub fn open_default() -> Result<Self> {
        let dir = config::ensure_config_dir()?;
        Self::open(dir.join(SETTINGS_FILE_NAME))
    }

    /// Open a settings file, creating an empty store if it does not exist
    ///
    /// An unreadable file is reported as an error; callers decide whether to
    /// fall back to defaults.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str::<Table>(&content)?
        } else {
            debug!("Settings file {} not found, starting empty", path.display());
            Table::new()
        };

        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    /// Directory containing the settings file
    pub fn settings_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a value, returning `default` when it is absent
    pub fn value(&self, section: &str, name: &str, default: Value) -> Value {
        let table = self.lock();
        table
            .get(section)
            .and_then(Value::as_table)
            .and_then(|s| s.get(name))
            .cloned()
            .unwrap_or(default)
    }

    pub fn entry_value(&self, entry: &SettingEntry) -> Value {
        self.value(&entry.section, &entry.name, entry.default.clone())
    }

    /// Write a value and persist the store
    ///
    /// The in-memory store only changes once the file was written.
    pub fn set_value(&self, section: &str, name: &str, value: impl Into<Value>) -> Result<()> {
        let mut table = self.lock();
        let mut updated = table.clone();
        match updated.get(section) {
            Some(Value::Table(_)) => {}
            Some(_) => {
                warn!("Settings section '{}' was not a table, replacing it", section);
                updated.insert(section.to_string(), Value::Table(Table::new()));
            }
            None => {
                updated.insert(section.to_string(), Value::Table(Table::new()));
            }
        }
        if let Some(Value::Table(s)) = updated.get_mut(section) {
            s.insert(name.to_string(), value.into());
        }

        self.persist(&updated)?;
        *table = updated;
        Ok(())
    }

    pub fn set_entry(&self, entry: &SettingEntry, value: impl Into<Value>) -> Result<()> {
        self.set_value(&entry.section, &entry.name, value)
    }

    /// Remove a value and persist the store
    ///
    /// Empty sections are dropped. Removing an absent value is not an error.
    pub fn remove_value(&self, section: &str, name: &str) -> Result<()> {
        let mut table = self.lock();
        let mut updated = table.clone();
        let now_empty = match updated.get_mut(section).and_then(Value::as_table_mut) {
            Some(s) => {
                if s.remove(name).is_none() {
                    return Ok(());
                }
                s.is_empty()
            }
            None => return Ok(()),
        };
        if now_empty {
            updated.remove(section);
        }

        self.persist(&updated)?;
        *table = updated;
        Ok(())
    }

    pub fn remove_entry(&self, entry: &SettingEntry) -> Result<()> {
        self.remove_value(&entry.section, &entry.name)
    }

    /// Encode a list of string pairs as a settings value
    pub fn list_to_value(list: &[(String, String)]) -> Value {
        Value::Array(
            list.iter()
                .map(|(a, b)| Value::Array(vec![Value::String(a.clone()), Value::String(b.clone())]))
                .collect(),
        )
    }

    /// Decode a settings value produced by [`Settings::list_to_value`]
    ///
    /// Malformed elements are skipped.
    pub fn value_to_list(value: &Value) -> Vec<(String, String)> {
        let Some(items) = value.as_array() else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| match item.as_array().map(Vec::as_slice) {
                Some([Value::String(a), Value::String(b)]) => Some((a.clone(), b.clone())),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Table> {
        // Mutations replace the table whole, so a poisoned table is still consistent
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, table: &Table) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string(table)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
