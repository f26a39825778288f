//! Transactional snapshot store for Licensor.
//!
//! Provides a single primitive, [`Store::transact`], that reads the whole
//! committed state, applies a closure to a draft copy, and durably
//! replaces the state before returning the closure's result. All
//! transactions on a store are globally serialized.
//!
//! # Architecture
//!
//! - [`Store`] is generic over any serde-serializable state type
//! - Bytes are persisted through the [`Backend`] trait
//! - [`JsonFileBackend`] writes the whole state as one JSON document,
//!   replaced atomically via temp file + rename
//! - [`MemoryBackend`] keeps the bytes in memory for tests

mod backend;
mod error;
mod store;

pub use backend::{Backend, JsonFileBackend, MemoryBackend};
pub use error::{StorageError, StorageResult};
pub use store::Store;
