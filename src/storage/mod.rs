//! Persistence of trees, update sessions and queued leaf records.

use core::fmt;

use crate::{LeafBatchRecord, RecordKey, SessionId, TreeKey, TreeState, session::UpdateLock};

mod error;
pub use error::StorageError;

#[cfg(feature = "rocksdb")]
mod rocksdb;
#[cfg(feature = "rocksdb")]
pub use rocksdb::{RocksDbConfig, RocksDbStorage};

mod memory;
pub use memory::MemoryStorage;

mod updates;
pub use updates::{StorageUpdateParts, StorageUpdates};


/// Commitment tree storage backend.
///
/// The protocol reads individual values and writes whole steps through [TreeStorage::apply], so
/// an implementation only has to provide point lookups and an atomic batch write. Implementations
/// can be in-memory maps or persistent databases (e.g., RocksDB).
pub trait TreeStorage: 'static + fmt::Debug + Send + Sync {
    /// Retrieves the state of the tree identified by `key`.
    /// Returns `Ok(None)` if no such tree was created.
    ///
    /// # Errors
    /// Returns `StorageError` if the storage read operation fails.
    fn get_tree(&self, key: &TreeKey) -> Result<Option<TreeState>, StorageError>;

    /// Retrieves the update session record stored under `session`.
    /// Returns `Ok(None)` if the session was never opened or has already ended.
    ///
    /// # Errors
    /// Returns `StorageError` if the storage read operation fails.
    fn get_lock(&self, session: &SessionId) -> Result<Option<UpdateLock>, StorageError>;

    /// Retrieves a single queued leaf record.
    ///
    /// # Errors
    /// Returns `StorageError` if the storage read operation fails.
    fn get_record(&self, key: &RecordKey) -> Result<Option<LeafBatchRecord>, StorageError>;

    /// Retrieves multiple queued leaf records.
    ///
    /// The returned `Vec` has the same length and order as `keys`, with `None` for every key
    /// that has no record.
    fn get_records(
        &self,
        keys: &[RecordKey],
    ) -> Result<Vec<Option<LeafBatchRecord>>, StorageError> {
        keys.iter().map(|key| self.get_record(key)).collect()
    }

    /// Applies a batch of `StorageUpdates` atomically to the storage backend.
    ///
    /// Implementations must ensure that all tree, session and record changes in the batch become
    /// visible together. If any part of the update fails, none of it may be applied.
    ///
    /// # Errors
    /// Returns `StorageError` if the write fails.
    fn apply(&self, updates: StorageUpdates) -> Result<(), StorageError>;
}

impl<S: TreeStorage + ?Sized> TreeStorage for Box<S> {
    fn get_tree(&self, key: &TreeKey) -> Result<Option<TreeState>, StorageError> {
        (**self).get_tree(key)
    }

    fn get_lock(&self, session: &SessionId) -> Result<Option<UpdateLock>, StorageError> {
        (**self).get_lock(session)
    }

    fn get_record(&self, key: &RecordKey) -> Result<Option<LeafBatchRecord>, StorageError> {
        (**self).get_record(key)
    }

    fn get_records(
        &self,
        keys: &[RecordKey],
    ) -> Result<Vec<Option<LeafBatchRecord>>, StorageError> {
        (**self).get_records(keys)
    }

    fn apply(&self, updates: StorageUpdates) -> Result<(), StorageError> {
        (**self).apply(updates)
    }
}
