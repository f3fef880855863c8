//! Persistent viewer preferences.
//!
//! Three scalar values survive between sessions: the wireframe flag, the
//! auto-rotate flag and the selected shape key. They are stored as strings in
//! a key-value [`PreferenceStore`]. Storage failures are never surfaced to the
//! caller: reads fall back to the documented default and failed writes are
//! logged and dropped.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;
use thiserror::Error;

use crate::catalog::DEFAULT_SHAPE_KEY;

pub const WIREFRAME_KEY: &str = "wireframe";
pub const AUTO_ROTATE_KEY: &str = "autoRotate";
pub const SELECTED_SHAPE_KEY: &str = "selectedKey";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("preference storage is unavailable: {0}")]
    Unavailable(String),
    #[error("failed to access preference file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("preference file is corrupt")]
    Corrupt(#[from] serde_json::Error),
}

/// Key-value persistence port. Values are plain strings.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process store. Clones share the same map, so a "remounted" viewer sees
/// what an earlier one wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<RwLock<BTreeMap<String, String>>>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every access fails, like a browser with storage disabled.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store disabled".into()));
        }
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store disabled".into()));
        }
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object on disk. The file is re-read on every access so concurrent
/// viewers observe each other's writes, last write wins.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl PreferenceStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = match self.load() {
            Ok(values) => values,
            Err(StoreError::Corrupt(err)) => {
                warn!("discarding corrupt preference file {}: {err}", self.path.display());
                BTreeMap::new()
            }
            Err(err) => return Err(err),
        };
        values.insert(key.to_string(), value.to_string());
        let contents = serde_json::to_string_pretty(&values)?;
        fs::write(&self.path, contents).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Typed view over a [`PreferenceStore`].
#[derive(Debug, Clone)]
pub struct Preferences<S> {
    store: S,
}

impl<S: PreferenceStore> Preferences<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// `"true"` and `"false"` are honoured, anything else yields `default`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.read(key).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.read(key).unwrap_or_else(|| default.to_string())
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.write(key, if value { "true" } else { "false" });
    }

    pub fn set_string(&mut self, key: &str, value: &str) {
        self.write(key, value);
    }

    /// Off unless explicitly stored as `"true"`.
    pub fn wireframe(&self) -> bool {
        self.get_bool(WIREFRAME_KEY, false)
    }

    /// On unless explicitly stored as `"false"`.
    pub fn auto_rotate(&self) -> bool {
        self.get_bool(AUTO_ROTATE_KEY, true)
    }

    pub fn selected_key(&self) -> String {
        self.get_string(SELECTED_SHAPE_KEY, DEFAULT_SHAPE_KEY)
    }

    pub fn set_wireframe(&mut self, value: bool) {
        self.set_bool(WIREFRAME_KEY, value);
    }

    pub fn set_auto_rotate(&mut self, value: bool) {
        self.set_bool(AUTO_ROTATE_KEY, value);
    }

    pub fn set_selected_key(&mut self, key: &str) {
        self.set_string(SELECTED_SHAPE_KEY, key);
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(err) => {
                debug!("preference {key} unreadable, using default: {err}");
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        match self.store.set(key, value) {
            Ok(()) => debug!("preference {key} = {value}"),
            Err(err) => warn!("failed to persist preference {key}: {err}"),
        }
    }
}
