//! TOML-file settings store.
//!
//! The whole file is read once on open. Writes go to memory and are written
//! back on [`SettingsStore::flush`] (and on drop) through a temporary file
//! and rename, so a crash mid-write never leaves a truncated settings file.

use super::{SettingValue, SettingsStore};
use crate::error::SettingsError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Settings persisted in a flat TOML table.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, SettingValue>,
    dirty: bool,
    /// False when an unreadable file is still in place; flush then never
    /// replaces it.
    writable: bool,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).map_err(|source| SettingsError::Malformed {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(SettingsError::Io { path, source }),
        };
        debug!(path = %path.display(), "opened settings file");
        Ok(Self {
            path,
            values,
            dirty: false,
            writable: true,
        })
    }

    /// Opens the store, starting empty if the file cannot be read.
    ///
    /// A malformed file is moved aside to [`Self::backup_path`] first. If it
    /// cannot be moved, or cannot be read at all, the store keeps working in
    /// memory and never writes over it.
    pub fn open_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let err = match Self::open(path.clone()) {
            Ok(store) => return store,
            Err(e) => e,
        };
        let writable = match &err {
            SettingsError::Malformed { .. } => {
                let backup = Self::backup_path(&path);
                match fs::rename(&path, &backup) {
                    Ok(()) => {
                        warn!(
                            error = %err,
                            backup = %backup.display(),
                            "malformed settings moved aside; starting empty"
                        );
                        true
                    }
                    Err(e) => {
                        warn!(
                            error = %err,
                            rename_error = %e,
                            "malformed settings left in place; changes will not be saved"
                        );
                        false
                    }
                }
            }
            _ => {
                warn!(error = %err, "settings unreadable; changes will not be saved");
                false
            }
        };
        Self {
            path,
            values: BTreeMap::new(),
            dirty: false,
            writable,
        }
    }

    /// Where [`Self::open_or_empty`] keeps a malformed file: `<path>.bak`.
    pub fn backup_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// `<config dir>/experiment-runner/settings.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("experiment-runner").join("settings.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of all values.
    pub fn values(&self) -> &BTreeMap<String, SettingValue> {
        &self.values
    }

    fn write_file(&self) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let text = toml::to_string(&self.values)?;
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, text).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl SettingsStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<SettingValue>, SettingsError> {
        Ok(self.values.get(key).cloned())
    }

    fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn save(&mut self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SettingsError> {
        if !self.dirty {
            return Ok(());
        }
        if !self.writable {
            debug!(path = %self.path.display(), "settings file not replaced");
            return Ok(());
        }
        self.write_file()?;
        self.dirty = false;
        debug!(path = %self.path.display(), count = self.values.len(), "settings written");
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "settings not saved on close");
        }
    }
}
