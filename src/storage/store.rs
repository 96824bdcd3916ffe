use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::types::{Settings, StorageError};

// ============================================================================
// Persistence Contract
// ============================================================================

/// A single named slot holding the serialized [`Settings`].
///
/// Writes are full snapshots. A failed `save` leaves in-memory state ahead
/// of the stored copy until the next successful write.
pub trait SettingsStore {
    /// Returns `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Settings>, StorageError>;

    fn save(&self, settings: &Settings) -> Result<(), StorageError>;

    /// Remove the stored slot entirely.
    fn clear(&self) -> Result<(), StorageError>;
}

// ============================================================================
// JSON File Store
// ============================================================================

/// Stores the settings as one JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self) -> Result<Option<Settings>, StorageError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No stored settings found");
                return Ok(None);
            }
            Err(e) => return Err(StorageError::Io(e)),
        };

        let settings = serde_json::from_str(&content)?;
        Ok(Some(settings))
    }

    fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        let content = serde_json::to_vec(settings)?;
        tracing::debug!(path = %self.path.display(), bytes = content.len(), "Storing settings");
        atomic_write(&self.path, &content)
    }

    fn clear(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Write `content` to `path` through a temp file and rename, so the slot is
/// never left half-written.
fn atomic_write(path: &Path, content: &[u8]) -> Result<(), StorageError> {
    use std::time::{SystemTime, UNIX_EPOCH};

    // SEC-009: Randomized temp filename to prevent TOCTOU race conditions
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(&temp_path)?;

    let written = file.write_all(content).and_then(|_| file.sync_all());
    drop(file);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(StorageError::Io(e));
    }

    #[cfg(windows)]
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(StorageError::Io(e));
        }
    }

    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(StorageError::Io(e));
    }

    Ok(())
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Keeps the serialized blob in memory. Goes through JSON on every call so
/// round-trip behavior matches the file store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with a raw document, e.g. a legacy blob.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    /// The raw stored document, if any.
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self) -> Result<Option<Settings>, StorageError> {
        let slot = self.slot.lock().map_err(|_| StorageError::Poisoned)?;
        match slot.as_deref() {
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
            None => Ok(None),
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        let raw = serde_json::to_string(settings)?;
        *self.slot.lock().map_err(|_| StorageError::Poisoned)? = Some(raw);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.slot.lock().map_err(|_| StorageError::Poisoned)? = None;
        Ok(())
    }
}

impl<S: SettingsStore + ?Sized> SettingsStore for &S {
    fn load(&self) -> Result<Option<Settings>, StorageError> {
        (**self).load()
    }

    fn save(&self, settings: &Settings) -> Result<(), StorageError> {
        (**self).save(settings)
    }

    fn clear(&self) -> Result<(), StorageError> {
        (**self).clear()
    }
}
