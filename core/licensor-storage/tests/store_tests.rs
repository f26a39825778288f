use licensor_storage::{
    Backend, JsonFileBackend, MemoryBackend, StorageError, StorageResult, Store,
};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Ledger {
    value: u64,
    entries: Vec<String>,
}

#[derive(Debug)]
enum TestError {
    Storage(StorageError),
    Rejected,
}

impl From<StorageError> for TestError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Memory backend whose writes can be switched to fail.
struct FlakyBackend {
    inner: MemoryBackend,
    failing: Arc<AtomicBool>,
}

impl FlakyBackend {
    fn new() -> (Self, Arc<AtomicBool>) {
        let failing = Arc::new(AtomicBool::new(false));
        let backend = Self {
            inner: MemoryBackend::new(),
            failing: Arc::clone(&failing),
        };
        (backend, failing)
    }
}

impl Backend for FlakyBackend {
    fn load(&self) -> StorageResult<Option<Vec<u8>>> {
        self.inner.load()
    }

    fn save(&self, bytes: &[u8]) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk unavailable".into()));
        }
        self.inner.save(bytes)
    }
}

fn push(store: &Store<Ledger>, entry: &str) -> Result<u64, TestError> {
    store.transact(|ledger| {
        ledger.value += 1;
        ledger.entries.push(entry.to_string());
        Ok(ledger.value)
    })
}

// ── transact ─────────────────────────────────────────────────────

#[test]
fn empty_store_starts_at_default() {
    let store: Store<Ledger> = Store::open_in_memory().unwrap();
    assert_eq!(store.read(Clone::clone), Ledger::default());
    assert_eq!(store.revision(), 0);
}

#[test]
fn transact_commits_and_returns_result() {
    let store = Store::open_in_memory().unwrap();
    assert_eq!(push(&store, "a").unwrap(), 1);
    assert_eq!(push(&store, "b").unwrap(), 2);

    let ledger = store.read(Clone::clone);
    assert_eq!(ledger.entries, vec!["a", "b"]);
    assert_eq!(store.revision(), 2);
}

#[test]
fn closure_error_discards_draft() {
    let store = Store::open_in_memory().unwrap();
    push(&store, "kept").unwrap();

    let result: Result<(), TestError> = store.transact(|ledger| {
        ledger.value = 99;
        ledger.entries.clear();
        Err(TestError::Rejected)
    });

    assert!(matches!(result, Err(TestError::Rejected)));
    let ledger = store.read(Clone::clone);
    assert_eq!(ledger.value, 1);
    assert_eq!(ledger.entries, vec!["kept"]);
    assert_eq!(store.revision(), 1);
}

#[test]
fn unchanged_draft_is_not_written() {
    let store: Store<Ledger> = Store::open_in_memory().unwrap();
    let value: Result<u64, TestError> = store.transact(|ledger| Ok(ledger.value));
    assert_eq!(value.unwrap(), 0);
    assert_eq!(store.revision(), 0);
}

#[test]
fn failed_write_keeps_previous_commit() {
    let (backend, failing) = FlakyBackend::new();
    let store = Store::with_backend(backend).unwrap();
    push(&store, "first").unwrap();

    failing.store(true, Ordering::SeqCst);
    let err = push(&store, "lost").unwrap_err();
    assert!(matches!(err, TestError::Storage(StorageError::Backend(_))));
    assert_eq!(store.read(|l| l.entries.clone()), vec!["first"]);
    assert_eq!(store.revision(), 1);

    failing.store(false, Ordering::SeqCst);
    assert_eq!(push(&store, "second").unwrap(), 2);
    assert_eq!(store.read(|l| l.entries.clone()), vec!["first", "second"]);
}

#[test]
fn panicking_closure_leaves_store_usable() {
    let store = Store::open_in_memory().unwrap();
    push(&store, "before").unwrap();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let _: Result<(), TestError> = store.transact(|ledger| {
            ledger.entries.push("half".into());
            panic!("closure blew up");
        });
    }));
    assert!(outcome.is_err());

    assert_eq!(store.read(|l| l.entries.clone()), vec!["before"]);
    assert_eq!(push(&store, "after").unwrap(), 2);
}

#[test]
fn concurrent_transactions_are_serialized() {
    let store = Store::open_in_memory().unwrap();

    std::thread::scope(|s| {
        for t in 0..8 {
            let store = &store;
            s.spawn(move || {
                for i in 0..50 {
                    push(store, &format!("{t}-{i}")).unwrap();
                }
            });
        }
    });

    let ledger = store.read(Clone::clone);
    assert_eq!(ledger.value, 400);
    assert_eq!(ledger.entries.len(), 400);
    assert_eq!(store.revision(), 400);
}

// ── JSON file backend ────────────────────────────────────────────

#[test]
fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    {
        let store = Store::open(&path).unwrap();
        push(&store, "persisted").unwrap();
    }

    let reopened: Store<Ledger> = Store::open(&path).unwrap();
    let ledger = reopened.read(Clone::clone);
    assert_eq!(ledger.value, 1);
    assert_eq!(ledger.entries, vec!["persisted"]);
}

#[test]
fn file_store_creates_missing_parent_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("state.json");

    let store = Store::open(&path).unwrap();
    push(&store, "x").unwrap();
    assert!(path.exists());
}

#[test]
fn file_store_leaves_no_temp_files_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let store = Store::open(&path).unwrap();
    for i in 0..5 {
        push(&store, &i.to_string()).unwrap();
    }

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("state.json")]);
}

#[test]
fn file_store_writes_readable_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let store = Store::open(&path).unwrap();
    push(&store, "visible").unwrap();

    let on_disk: Ledger = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(on_disk, store.read(Clone::clone));
}

#[test]
fn file_backend_save_is_visible_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let backend = JsonFileBackend::new(dir.path().join("sub").join("state.json")).unwrap();
    assert_eq!(backend.path(), dir.path().join("sub").join("state.json"));
    assert_eq!(backend.load().unwrap(), None);

    backend.save(b"{\"v\":1}").unwrap();
    backend.save(b"{\"v\":2}").unwrap();

    assert_eq!(backend.load().unwrap(), Some(b"{\"v\":2}".to_vec()));
    assert_eq!(std::fs::read(backend.path()).unwrap(), b"{\"v\":2}");
}

#[test]
fn file_backend_reports_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let backend = JsonFileBackend::new(dir.path().join("gone").join("state.json")).unwrap();
    std::fs::remove_dir(dir.path().join("gone")).unwrap();

    let err = backend.save(b"{}").unwrap_err();
    assert!(matches!(err, StorageError::Io(_)));
    assert!(!backend.path().exists());
}

#[test]
fn corrupt_file_is_rejected_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let result: StorageResult<Store<Ledger>> = Store::open(&path);
    assert!(matches!(result, Err(StorageError::Serialization(_))));
}

#[test]
fn error_display() {
    let err = StorageError::Backend("disk full".into());
    assert!(err.to_string().contains("backend error"));
    assert!(err.to_string().contains("disk full"));
}
