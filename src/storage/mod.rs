//! Durable key-value storage shared by every browsing context of an origin
//!
//! A [`LocalStore`] is the origin-wide map. Each context works through its
//! own [`StorageArea`]; writes made through one area are announced to every
//! subscriber as a [`StorageEvent`] tagged with the writing context.

pub mod keys;

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Error;

const EVENT_CAPACITY: usize = 64;

/// Identifies one browsing context (tab) of the origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Change notification emitted for every write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// The key that changed
    pub key: String,
    /// The new value, `None` when the key was removed
    pub new_value: Option<String>,
    /// The context that made the change
    pub origin: ContextId,
}

/// Origin-wide persistent map from string keys to string values
#[derive(Debug)]
pub struct LocalStore {
    entries: RwLock<BTreeMap<String, String>>,
    path: Option<PathBuf>,
    events: broadcast::Sender<StorageEvent>,
}

impl LocalStore {
    /// Create a store that lives only in memory
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self::with_entries(BTreeMap::new(), None))
    }

    /// Open a store persisted as a JSON object at `path`.
    ///
    /// A missing file starts an empty store; the file is created on first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Arc<Self>, Error> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(Error::storage(format!(
                    "failed to read {}: {}",
                    path.display(),
                    err
                )))
            }
        };

        log::debug!("Opened local store at {}", path.display());
        Ok(Arc::new(Self::with_entries(entries, Some(path))))
    }

    fn with_entries(entries: BTreeMap<String, String>, path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: RwLock::new(entries),
            path,
            events,
        }
    }

    /// Open a new browsing context on this store
    pub fn area(self: &Arc<Self>) -> StorageArea {
        StorageArea {
            store: Arc::clone(self),
            context: ContextId::new(),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn write(&self, key: &str, value: Option<&str>, origin: ContextId) -> Result<(), Error> {
        // Held until the file is written, so disk sees writes in memory order.
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match value {
            Some(value) => {
                entries.insert(key.to_string(), value.to_string());
            }
            None => {
                if entries.remove(key).is_none() {
                    return Ok(());
                }
            }
        }

        // No subscribers is fine.
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            new_value: value.map(str::to_string),
            origin,
        });

        match &self.path {
            Some(path) => persist(path, &entries),
            None => Ok(()),
        }
    }
}

/// Write `entries` to a temp file next to `path`, then rename it into place
fn persist(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), Error> {
    let bytes = serde_json::to_vec_pretty(entries)?;
    let temp_path = path.with_extension("json.tmp");

    fs::write(&temp_path, bytes)
        .and_then(|()| fs::rename(&temp_path, path))
        .map_err(|err| {
            log::error!("Failed to persist local store to {}: {}", path.display(), err);
            Error::storage(format!("failed to write {}: {}", path.display(), err))
        })
}

/// One browsing context's handle on a [`LocalStore`]
#[derive(Debug, Clone)]
pub struct StorageArea {
    store: Arc<LocalStore>,
    context: ContextId,
}

impl StorageArea {
    /// Context that writes through this area are attributed to
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Open another context on the same store
    pub fn open_context(&self) -> StorageArea {
        self.store.area()
    }

    /// Read a value
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.get(key)
    }

    /// Whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.store.get(key).is_some()
    }

    /// Write a value.
    ///
    /// The in-memory value changes even if persisting to disk fails.
    pub fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.store.write(key, Some(value), self.context)
    }

    /// Remove a value.
    ///
    /// The in-memory value is removed even if persisting to disk fails.
    pub fn remove(&self, key: &str) -> Result<(), Error> {
        self.store.write(key, None, self.context)
    }

    /// Subscribe to writes made by any context of this origin
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.store.events.subscribe()
    }
}
