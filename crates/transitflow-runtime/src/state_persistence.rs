#![forbid(unsafe_code)]

//! Keyed blob persistence.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                StateRegistry                  │
//! │   in-memory cache of keyed blobs + dirty flag │
//! └──────────────────────────────────────────────┘
//!                        │ load / flush
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │                StorageBackend                 │
//! │   MemoryStorage: ephemeral, for tests         │
//! │   FileStorage: one JSON file, atomic writes   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Blobs are opaque bytes; callers own their encoding. The application stores
//! its search history under a single key.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Returned, cache unaffected |
//! | `StorageError::Serialization` | State file is not valid JSON | Returned from `load` |
//! | Bad base64 in one entry | Hand-edited file | Entry skipped, logged |
//! | Format version mismatch | Older/newer build | Treated as empty |

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage corruption: {0}")]
    Corruption(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

fn poisoned(what: &str) -> StorageError {
    StorageError::Corruption(format!("{what} lock poisoned"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A stored blob with its schema version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    pub version: u32,
    pub data: Vec<u8>,
}

/// Pluggable storage for the registry.
pub trait StorageBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Load every stored entry; empty on first run.
    fn load_all(&self) -> StorageResult<HashMap<String, StoredEntry>>;

    /// Replace all stored entries.
    fn save_all(&self, entries: &HashMap<String, StoredEntry>) -> StorageResult<()>;

    fn clear(&self) -> StorageResult<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Ephemeral storage; lost on exit.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn load_all(&self) -> StorageResult<HashMap<String, StoredEntry>> {
        let guard = self.data.read().map_err(|_| poisoned("memory"))?;
        Ok(guard.clone())
    }

    fn save_all(&self, entries: &HashMap<String, StoredEntry>) -> StorageResult<()> {
        let mut guard = self.data.write().map_err(|_| poisoned("memory"))?;
        *guard = entries.clone();
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.data.write().map_err(|_| poisoned("memory"))?.clear();
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.data.read().map(|g| g.len()).unwrap_or(0);
        f.debug_struct("MemoryStorage")
            .field("entries", &count)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct StateFile {
    format_version: u32,
    entries: HashMap<String, FileEntry>,
}

#[derive(Serialize, Deserialize)]
struct FileEntry {
    version: u32,
    data_base64: String,
}

impl StateFile {
    const FORMAT_VERSION: u32 = 1;
}

/// Storage in a single JSON file.
///
/// ```json
/// {
///   "format_version": 1,
///   "entries": {
///     "transitHistory": { "version": 1, "data_base64": "W3sib3JpZ2luIjoi..." }
///   }
/// }
/// ```
///
/// Writes go to `{path}.tmp`, are synced, then renamed over `{path}`.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage at `path`; the file is created on first save.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// `$XDG_STATE_HOME/{app_name}/state.json`, falling back to
    /// `~/.local/state` and then the working directory.
    #[must_use]
    pub fn default_for_app(app_name: &str) -> Self {
        Self::new(state_dir().join(app_name).join("state.json"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone();
        tmp.set_extension("json.tmp");
        tmp
    }
}

fn state_dir() -> PathBuf {
    if let Some(state_home) = std::env::var_os("XDG_STATE_HOME") {
        return PathBuf::from(state_home);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home).join(".local").join("state");
    }
    PathBuf::from(".")
}

impl StorageBackend for FileStorage {
    fn name(&self) -> &str {
        "FileStorage"
    }

    fn load_all(&self) -> StorageResult<HashMap<String, StoredEntry>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let state_file: StateFile = serde_json::from_reader(reader)
            .map_err(|e| StorageError::Serialization(format!("failed to parse state file: {e}")))?;

        if state_file.format_version != StateFile::FORMAT_VERSION {
            tracing::warn!(
                stored = state_file.format_version,
                expected = StateFile::FORMAT_VERSION,
                "state file format version mismatch, ignoring stored state"
            );
            return Ok(HashMap::new());
        }

        let mut result = HashMap::with_capacity(state_file.entries.len());
        for (key, entry) in state_file.entries {
            let data = match BASE64.decode(&entry.data_base64) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "undecodable state entry, skipping");
                    continue;
                }
            };
            result.insert(
                key.clone(),
                StoredEntry {
                    key,
                    version: entry.version,
                    data,
                },
            );
        }
        Ok(result)
    }

    fn save_all(&self, entries: &HashMap<String, StoredEntry>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let state_file = StateFile {
            format_version: StateFile::FORMAT_VERSION,
            entries: entries
                .iter()
                .map(|(key, entry)| {
                    (
                        key.clone(),
                        FileEntry {
                            version: entry.version,
                            data_base64: BASE64.encode(&entry.data),
                        },
                    )
                })
                .collect(),
        };

        let tmp_path = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            serde_json::to_writer_pretty(&mut writer, &state_file)
                .map_err(|e| StorageError::Serialization(format!("failed to serialize state: {e}")))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), entries = entries.len(), "saved state");
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStorage")
            .field("path", &self.path)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// State Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Cache of keyed blobs in front of a [`StorageBackend`].
///
/// `set`/`remove` only touch the cache and mark it dirty; [`flush`](Self::flush)
/// writes it through. The registry is `Send + Sync` so it can be shared with
/// the runtime behind an `Arc`.
pub struct StateRegistry {
    backend: Box<dyn StorageBackend>,
    cache: RwLock<HashMap<String, StoredEntry>>,
    dirty: RwLock<bool>,
}

impl StateRegistry {
    /// Registry over `backend`; call [`load`](Self::load) to populate it.
    #[must_use]
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
            dirty: RwLock::new(false),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    #[must_use]
    pub fn with_file(path: impl AsRef<Path>) -> Self {
        Self::new(Box::new(FileStorage::new(path)))
    }

    /// Replace the cache with the backend's contents.
    pub fn load(&self) -> StorageResult<usize> {
        let entries = self.backend.load_all()?;
        let count = entries.len();
        *self.cache.write().map_err(|_| poisoned("cache"))? = entries;
        *self.dirty.write().map_err(|_| poisoned("dirty"))? = false;
        tracing::debug!(backend = %self.backend.name(), count, "loaded state");
        Ok(count)
    }

    /// Write the cache through if it changed.
    ///
    /// Returns `Ok(true)` when something was written.
    pub fn flush(&self) -> StorageResult<bool> {
        if !*self.dirty.read().map_err(|_| poisoned("dirty"))? {
            return Ok(false);
        }
        {
            let cache = self.cache.read().map_err(|_| poisoned("cache"))?;
            self.backend.save_all(&cache)?;
        }
        *self.dirty.write().map_err(|_| poisoned("dirty"))? = false;
        Ok(true)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<StoredEntry> {
        self.cache.read().ok()?.get(key).cloned()
    }

    /// Store a blob in the cache and mark it dirty.
    pub fn set(&self, key: impl Into<String>, version: u32, data: Vec<u8>) {
        let key = key.into();
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key.clone(), StoredEntry { key, version, data });
            self.mark_dirty();
        }
    }

    pub fn remove(&self, key: &str) -> Option<StoredEntry> {
        let removed = self.cache.write().ok()?.remove(key);
        if removed.is_some() {
            self.mark_dirty();
        }
        removed
    }

    /// Clear both cache and backend.
    pub fn clear(&self) -> StorageResult<()> {
        self.backend.clear()?;
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
        if let Ok(mut dirty) = self.dirty.write() {
            *dirty = false;
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.read().map(|d| *d).unwrap_or(false)
    }

    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn mark_dirty(&self) {
        if let Ok(mut dirty) = self.dirty.write() {
            *dirty = true;
        }
    }
}

impl fmt::Debug for StateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateRegistry")
            .field("backend", &self.backend.name())
            .field("entries", &self.len())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
