//! In-memory settings store.

use super::{SettingValue, SettingsStore};
use crate::error::SettingsError;
use std::collections::BTreeMap;

/// Settings kept in a map for the lifetime of the process.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStore {
    values: BTreeMap<String, SettingValue>,
    flushes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `values`.
    pub fn with_values(values: BTreeMap<String, SettingValue>) -> Self {
        Self { values, flushes: 0 }
    }

    /// All stored values, sorted by key.
    pub fn values(&self) -> &BTreeMap<String, SettingValue> {
        &self.values
    }

    /// Number of `flush` calls seen.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<SettingValue>, SettingsError> {
        Ok(self.values.get(key).cloned())
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn save(&mut self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SettingsError> {
        self.flushes += 1;
        Ok(())
    }
}
