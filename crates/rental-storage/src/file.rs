//! JSON file storage backend.

use crate::{SecureStorage, StorageError, StorageResult};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// File-backed storage holding every key in one JSON object.
///
/// Writes go to a sibling temp file that is renamed over the original, so a
/// crash mid-write leaves either the old or the new contents, never a torn
/// file. On unix the temp file is created with mode `0600`.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    /// Open (or lazily create) the storage file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> StorageResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| StorageError::Encoding(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> StorageResult<()> {
        let content =
            serde_json::to_string_pretty(map).map_err(|e| StorageError::Encoding(e.to_string()))?;
        let tmp_path = self.path.with_extension("tmp");

        let mut file = create_private(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn with_lock<T>(&self, f: impl FnOnce() -> StorageResult<T>) -> StorageResult<T> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }
}

/// Open `path` for writing, owner-only before any byte lands in it. A
/// leftover file from an interrupted write is truncated and tightened too.
#[cfg(unix)]
fn create_private(path: &Path) -> StorageResult<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> StorageResult<File> {
    Ok(OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}

impl SecureStorage for FileStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(key = %key, "Setting stored value");
        self.with_lock(|| {
            let mut map = self.read_map()?;
            map.insert(key.to_string(), value.to_string());
            self.write_map(&map)
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.with_lock(|| Ok(self.read_map()?.get(key).cloned()))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(key = %key, "Deleting stored value");
        self.with_lock(|| {
            let mut map = self.read_map()?;
            let existed = map.remove(key).is_some();
            if existed {
                self.write_map(&map)?;
            }
            Ok(existed)
        })
    }
}
