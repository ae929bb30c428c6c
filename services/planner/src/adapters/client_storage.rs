//! services/planner/src/adapters/client_storage.rs
//!
//! Adapters for the `ClientStorage` port: the small set of string values a
//! client keeps between runs (session token, email, last known profile).

use parking_lot::Mutex;
use planner_core::ClientStorage;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

//=========================================================================================
// File-backed Storage
//=========================================================================================

/// Persists the values as a JSON object in a single file.
/// Write failures are logged and otherwise ignored; the in-memory view stays
/// authoritative for the running process.
pub struct FileClientStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileClientStorage {
    /// Opens the storage file, starting empty if it is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Ignoring unreadable client state at {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn persist(&self, values: &BTreeMap<String, String>) {
        let result = serde_json::to_string_pretty(values)
            .map_err(std::io::Error::other)
            .and_then(|raw| std::fs::write(&self.path, raw));
        if let Err(e) = result {
            warn!("Failed to persist client state to {}: {}", self.path.display(), e);
        }
    }
}

impl ClientStorage for FileClientStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());
        self.persist(&values);
    }

    fn remove(&self, key: &str) {
        let mut values = self.values.lock();
        if values.remove(key).is_some() {
            self.persist(&values);
        }
    }
}

//=========================================================================================
// In-memory Storage
//=========================================================================================

/// Keeps the values for the lifetime of the process only.
#[derive(Default)]
pub struct MemoryClientStorage {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryClientStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStorage for MemoryClientStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.lock().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values.lock().remove(key);
    }
}
