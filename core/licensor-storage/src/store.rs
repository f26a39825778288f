//! The transactional snapshot store.

use crate::backend::{Backend, JsonFileBackend, MemoryBackend};
use crate::error::{StorageError, StorageResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

struct Committed<S> {
    state: S,
    revision: u64,
}

/// A whole-state store with serialized read-modify-write transactions.
///
/// The store owns the last committed state of type `S`. Every
/// [`transact`](Self::transact) call holds a single store-wide lock for
/// its entire duration, so transactions are strictly serialized and no
/// caller ever observes a half-applied change.
///
/// The committed state is replaced only after the backend accepted the
/// new bytes. A failed write leaves both the backend and the in-memory
/// state exactly as they were.
pub struct Store<S> {
    backend: Box<dyn Backend>,
    committed: Mutex<Committed<S>>,
}

impl<S> Store<S>
where
    S: Serialize + DeserializeOwned + Default + Clone + PartialEq,
{
    /// Opens (or creates) a JSON-file store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_backend(JsonFileBackend::new(path)?)
    }

    /// Opens an empty in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_backend(MemoryBackend::new())
    }

    /// Opens a store over an arbitrary backend, loading its current state.
    ///
    /// A backend with no saved state yields `S::default()`.
    pub fn with_backend(backend: impl Backend + 'static) -> StorageResult<Self> {
        let state = match backend.load()? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => S::default(),
        };
        Ok(Self {
            backend: Box::new(backend),
            committed: Mutex::new(Committed { state, revision: 0 }),
        })
    }

    /// Runs `f` against a draft of the current state and commits the draft.
    ///
    /// - If `f` returns `Err`, the draft is discarded and nothing is written.
    /// - If `f` leaves the draft equal to the committed state, nothing is written.
    /// - Otherwise the draft is persisted; on success it becomes the
    ///   committed state, on failure the error is returned and the
    ///   previous state stays committed.
    ///
    /// `f` must not block on anything but CPU work: every other
    /// transaction waits while it runs.
    pub fn transact<R, E>(&self, f: impl FnOnce(&mut S) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StorageError>,
    {
        let mut committed = self.lock();
        let mut draft = committed.state.clone();
        let result = f(&mut draft)?;

        if draft == committed.state {
            debug!(revision = committed.revision, "Transaction made no changes");
            return Ok(result);
        }

        let bytes = serde_json::to_vec_pretty(&draft).map_err(StorageError::from)?;
        if let Err(e) = self.backend.save(&bytes) {
            warn!(revision = committed.revision, "Store write failed, keeping last commit: {}", e);
            return Err(e.into());
        }

        committed.state = draft;
        committed.revision += 1;
        debug!(revision = committed.revision, size_bytes = bytes.len(), "Transaction committed");
        Ok(result)
    }

    /// Runs `f` against a consistent snapshot of the committed state.
    ///
    /// Serialized with transactions, so `f` never sees a state that is
    /// being replaced.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let committed = self.lock();
        f(&committed.state)
    }

    /// Number of commits that changed the state since the store was opened.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    // A panic inside a transaction closure only ever touched the draft,
    // so the committed state behind a poisoned lock is still whole.
    fn lock(&self) -> MutexGuard<'_, Committed<S>> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
