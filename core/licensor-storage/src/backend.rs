//! Persistence backends for [`Store`](crate::Store).
//!
//! A backend only moves opaque bytes. It never interprets the state and
//! never sees a partially built snapshot: `save` is called with the full
//! serialized state of a transaction that is about to commit.

use crate::error::{StorageError, StorageResult};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

/// Durable home of the serialized store state.
pub trait Backend: Send + Sync {
    /// Returns the last saved bytes, or `None` if nothing was ever saved.
    fn load(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces the saved bytes. Must be all-or-nothing: after an error,
    /// a subsequent `load` returns the previous bytes.
    fn save(&self, bytes: &[u8]) -> StorageResult<()>;
}

/// Stores the state as a single JSON file.
///
/// Writes go to a temporary file in the same directory, are synced, and
/// are then renamed over the target, so readers see either the old file
/// or the new one.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Creates a backend for `path`, creating the parent directory if needed.
    pub fn new(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = non_empty_parent(&path) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Returns the path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend for JsonFileBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, bytes: &[u8]) -> StorageResult<()> {
        let dir = non_empty_parent(&self.path).unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| StorageError::Io(e.error))?;
        sync_dir(dir)
    }
}

// The rename is only durable once the directory entry is on disk.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> StorageResult<()> {
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> StorageResult<()> {
    Ok(())
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Keeps the serialized state in memory (for testing and ephemeral runs).
#[derive(Debug, Default)]
pub struct MemoryBackend {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryBackend {
    /// Creates an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, bytes: &[u8]) -> StorageResult<()> {
        *self.bytes.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes.to_vec());
        Ok(())
    }
}
