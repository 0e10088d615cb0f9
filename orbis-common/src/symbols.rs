//! Exported symbol table
//!
//! Guest binaries resolve library functions by a stable identifier (NID)
//! scoped to a library and module name/version. HLE libraries register one
//! entry per guest-callable operation; the loader looks entries up by key.

use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Stable identifier of an exported guest function
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    pub nid: String,
    pub library: String,
    pub library_version: u16,
    pub module: String,
    pub module_version_major: u8,
    pub module_version_minor: u8,
}

impl SymbolKey {
    pub fn new(
        nid: &str,
        library: &str,
        library_version: u16,
        module: &str,
        module_version_major: u8,
        module_version_minor: u8,
    ) -> Self {
        Self {
            nid: nid.to_string(),
            library: library.to_string(),
            library_version,
            module: module.to_string(),
            module_version_major,
            module_version_minor,
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}#{}#{}#{}.{}",
            self.nid,
            self.library,
            self.library_version,
            self.module,
            self.module_version_major,
            self.module_version_minor
        )
    }
}

/// A registered export
#[derive(Debug, Clone)]
pub struct SymbolRecord<T> {
    /// Human-readable function name
    pub name: &'static str,
    pub value: T,
}

/// Map from stable symbol key to registered export
#[derive(Debug)]
pub struct SymbolTable<T> {
    entries: HashMap<SymbolKey, SymbolRecord<T>>,
}

impl<T> SymbolTable<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register an export; a second registration under the same key fails
    pub fn register(&mut self, key: SymbolKey, name: &'static str, value: T) -> Result<()> {
        if self.entries.contains_key(&key) {
            return Err(Error::DuplicateSymbol(format!("{} ({})", key, name)));
        }
        self.entries.insert(key, SymbolRecord { name, value });
        Ok(())
    }

    pub fn resolve(&self, key: &SymbolKey) -> Option<&SymbolRecord<T>> {
        self.entries.get(key)
    }

    /// Look up an export by NID alone, ignoring library scoping
    pub fn resolve_nid(&self, nid: &str) -> Option<&SymbolRecord<T>> {
        self.entries
            .iter()
            .find(|(key, _)| key.nid == nid)
            .map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SymbolKey, &SymbolRecord<T>)> {
        self.entries.iter()
    }
}

impl<T> Default for SymbolTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
