//! Persistent key-value storage for the location record.
//!
//! The default backend is a JSON object at ~/.geoclock/storage.json, one
//! entry per key. The location record lives under [`STATE_KEY`].

use super::types::{LocationState, StoredState};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Key the location record is stored under.
pub const STATE_KEY: &str = "geoclockState";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// JSON file backend. Every `set` rewrites the whole file.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at a specific path. A missing or unreadable file
    /// starts out empty.
    pub fn open(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".geoclock")
            .join("storage.json")
    }

    fn read_file(path: &Path) -> Option<Map<String, Value>> {
        let data = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!("discarding unreadable storage file {}: {}", path.display(), e);
                None
            }
        }
    }

    fn persist(&self, entries: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, json).map_err(io_err)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        self.persist(&entries)
    }
}

/// In-process backend, used by `--offline` dry runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// Read the stored record, if any. A record that does not parse is logged
/// and treated as absent.
pub fn load_stored(store: &dyn KeyValueStore) -> Result<Option<StoredState>, StoreError> {
    let Some(value) = store.get(STATE_KEY)? else {
        return Ok(None);
    };
    match serde_json::from_value(value) {
        Ok(stored) => Ok(Some(stored)),
        Err(e) => {
            warn!("ignoring malformed stored location state: {}", e);
            Ok(None)
        }
    }
}

pub fn save_state(store: &dyn KeyValueStore, state: &LocationState) -> Result<(), StoreError> {
    let value = serde_json::to_value(StoredState::from(state))?;
    store.set(STATE_KEY, value)?;
    debug!(
        "persisted location state: {} / {}",
        state.time_zone.name(),
        state.country_code
    );
    Ok(())
}
