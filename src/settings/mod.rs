//! Persistent key/value settings.
//!
//! The front-end remembers everything the operator typed: per-tab units and
//! field texts, per-tab positional parameters, equipment addresses, sample
//! metadata. This module defines the abstract store and three backends:
//!
//! - [`MemoryStore`]: in-process map, used by tests and dry runs.
//! - [`FileStore`]: a flat TOML file under the user's config directory.
//! - [`QueuedStore`]: serves reads from a snapshot and forwards writes to a
//!   single background writer task (see `queue`).
//!
//! Persistence is best-effort. The [`SettingsExt`] helpers used by the core
//! log failures and fall back to defaults instead of propagating them.

pub mod file;
pub mod keys;
pub mod memory;
pub mod queue;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use queue::QueuedStore;

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A persisted value. Keys live in one flat namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Integer(i64),
    Text(String),
    IntegerList(Vec<i64>),
}

impl SettingValue {
    /// Type name used in mismatch diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Integer(_) => "integer",
            SettingValue::Text(_) => "string",
            SettingValue::IntegerList(_) => "integer list",
        }
    }
}

/// Abstract key/value store.
pub trait SettingsStore {
    /// Reads a key. `Ok(None)` when the key was never written.
    fn load(&self, key: &str) -> Result<Option<SettingValue>, SettingsError>;

    /// All keys currently stored.
    fn keys(&self) -> Vec<String>;

    /// Writes a key, replacing any previous value.
    fn save(&mut self, key: &str, value: SettingValue) -> Result<(), SettingsError>;

    /// Makes previous writes durable. Backends that write through may ignore it.
    fn flush(&mut self) -> Result<(), SettingsError> {
        Ok(())
    }
}

impl<S: SettingsStore + ?Sized> SettingsStore for Box<S> {
    fn load(&self, key: &str) -> Result<Option<SettingValue>, SettingsError> {
        (**self).load(key)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }

    fn save(&mut self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
        (**self).save(key, value)
    }

    fn flush(&mut self) -> Result<(), SettingsError> {
        (**self).flush()
    }
}

/// Typed, best-effort accessors on top of [`SettingsStore`].
///
/// Read failures and type mismatches are logged and reported as "absent";
/// write failures are logged and swallowed.
pub trait SettingsExt: SettingsStore {
    /// Reads a string value.
    fn load_text(&self, key: &str) -> Option<String> {
        match self.load_logged(key)? {
            SettingValue::Text(text) => Some(text),
            // Integers written by older versions under text keys still read back.
            SettingValue::Integer(n) => Some(n.to_string()),
            other => {
                mismatch(key, "string", &other);
                None
            }
        }
    }

    /// Reads an integer value.
    fn load_int(&self, key: &str) -> Option<i64> {
        match self.load_logged(key)? {
            SettingValue::Integer(n) => Some(n),
            SettingValue::Text(text) => match text.trim().parse() {
                Ok(n) => Some(n),
                Err(_) => {
                    mismatch(key, "integer", &SettingValue::Text(text));
                    None
                }
            },
            other => {
                mismatch(key, "integer", &other);
                None
            }
        }
    }

    /// Reads an integer list value.
    fn load_int_list(&self, key: &str) -> Option<Vec<i64>> {
        match self.load_logged(key)? {
            SettingValue::IntegerList(list) => Some(list),
            other => {
                mismatch(key, "integer list", &other);
                None
            }
        }
    }

    /// Writes a string value.
    fn save_text(&mut self, key: &str, value: &str) {
        self.save_logged(key, SettingValue::Text(value.to_string()));
    }

    /// Writes an integer value.
    fn save_int(&mut self, key: &str, value: i64) {
        self.save_logged(key, SettingValue::Integer(value));
    }

    /// Writes an integer list value.
    fn save_int_list(&mut self, key: &str, values: &[i64]) {
        self.save_logged(key, SettingValue::IntegerList(values.to_vec()));
    }

    /// Flushes, logging any failure.
    fn flush_logged(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "settings flush failed; continuing without persistence");
        }
    }

    #[doc(hidden)]
    fn load_logged(&self, key: &str) -> Option<SettingValue> {
        match self.load(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "settings read failed; using default");
                None
            }
        }
    }

    #[doc(hidden)]
    fn save_logged(&mut self, key: &str, value: SettingValue) {
        if let Err(e) = self.save(key, value) {
            warn!(key, error = %e, "settings write failed; continuing without persistence");
        }
    }
}

impl<S: SettingsStore + ?Sized> SettingsExt for S {}

fn mismatch(key: &str, expected: &'static str, found: &SettingValue) {
    let err = SettingsError::TypeMismatch {
        key: key.to_string(),
        expected,
        found: found.type_name(),
    };
    warn!(error = %err, "ignoring stored setting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_helpers_read_back_what_they_wrote() {
        let mut store = MemoryStore::new();
        store.save_text("SampleName", "Nb film");
        store.save_int("ActiveTab", 4);
        store.save_int_list("ContactNumbers", &[5, 6, 7, 8]);

        assert_eq!(store.load_text("SampleName").as_deref(), Some("Nb film"));
        assert_eq!(store.load_int("ActiveTab"), Some(4));
        assert_eq!(store.load_int_list("ContactNumbers"), Some(vec![5, 6, 7, 8]));
        assert_eq!(store.load_text("Missing"), None);
    }

    #[test]
    fn mismatched_types_read_as_absent() {
        let mut store = MemoryStore::new();
        store.save_int_list("ActiveTab", &[1, 2]);
        store.save_text("SourceSweep", "GPIB");
        assert_eq!(store.load_int("ActiveTab"), None);
        assert_eq!(store.load_int("SourceSweep"), None);
    }

    #[test]
    fn numeric_text_reads_as_integer() {
        let mut store = MemoryStore::new();
        store.save_text("Signal_generator", "18");
        assert_eq!(store.load_int("Signal_generator"), Some(18));
    }
}
