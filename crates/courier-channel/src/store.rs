//! Settings persistence.
//!
//! Settings are loaded once before `ready` and written back when the channel
//! terminates. A missing file is not an error; the plugin starts from its
//! defaults. A file that exists but cannot be parsed is reported so the
//! caller can refuse to start.

use std::fs;
use std::io;
use std::rc::Rc;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{HandlerError, StoreError};
use crate::registry::ShutdownHook;
use crate::session::{Session, Settings};

const STORE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::store");

/// Source and sink for persisted plugin settings.
pub trait SettingsStore {
    /// Loads the stored settings, or `None` when nothing has been saved.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when stored settings exist but cannot be
    /// read or decoded.
    fn load(&self) -> Result<Option<Settings>, StoreError>;

    /// Persists the settings, replacing anything stored previously.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] when the settings cannot be written.
    fn save(&self, settings: &Settings) -> Result<(), StoreError>;
}

impl<S: SettingsStore + ?Sized> SettingsStore for Rc<S> {
    fn load(&self) -> Result<Option<Settings>, StoreError> {
        (**self).load()
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        (**self).save(settings)
    }
}

/// Stores settings as a pretty-printed JSON object in a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonFileStore {
    path: Utf8PathBuf,
}

impl JsonFileStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        self.path.as_path()
    }

    fn temporary_path(&self) -> Utf8PathBuf {
        let file_name = self.path.file_name().unwrap_or("settings");
        self.path.with_file_name(format!("{file_name}.tmp"))
    }

    fn write_error(&self, source: io::Error) -> StoreError {
        StoreError::Write {
            path: self.path.clone(),
            source: Arc::new(source),
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Option<Settings>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(target: STORE_TARGET, path = %self.path, "no stored settings");
                return Ok(None);
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source: Arc::new(source),
                });
            }
        };

        let value: Value = serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source: Arc::new(source),
        })?;
        let Value::Object(map) = value else {
            return Err(StoreError::NotAnObject {
                path: self.path.clone(),
            });
        };
        info!(target: STORE_TARGET, path = %self.path, keys = map.len(), "loaded settings");
        Ok(Some(Settings::from(map)))
    }

    fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        let directory = self.path.parent().filter(|dir| !dir.as_str().is_empty());
        if let Some(parent) = directory {
            fs::create_dir_all(parent).map_err(|source| self.write_error(source))?;
        }

        let mut data = serde_json::to_vec_pretty(settings).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source: Arc::new(source),
        })?;
        data.push(b'\n');

        let temporary = self.temporary_path();
        fs::write(&temporary, &data).map_err(|source| self.write_error(source))?;
        fs::rename(&temporary, &self.path).map_err(|source| self.write_error(source))?;
        info!(target: STORE_TARGET, path = %self.path, "saved settings");
        Ok(())
    }
}

/// Shutdown hook that writes the session settings to a store.
#[derive(Debug, Clone)]
pub struct PersistSettings<S> {
    store: S,
}

impl<S> PersistSettings<S> {
    /// Wraps a store.
    pub const fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: SettingsStore> ShutdownHook for PersistSettings<S> {
    fn on_shutdown(&self, session: &mut Session) -> Result<(), HandlerError> {
        self.store
            .save(session.settings())
            .map_err(|error| HandlerError::failed(error.to_string()))
    }
}
