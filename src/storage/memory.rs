use std::sync::RwLock;

use super::{StorageError, StorageUpdateParts, StorageUpdates, TreeStorage};
use crate::{LeafBatchRecord, Map, RecordKey, SessionId, TreeKey, TreeState, session::UpdateLock};

/// In-memory storage for commitment trees, implementing the [TreeStorage] trait.
///
/// Trees, sessions and records live in three maps guarded by `std::sync::RwLock`. A batch takes
/// the write side of all three before touching any of them, so readers never observe half of a
/// step.
///
/// Intended for tests and for deployments where a higher layer takes care of persistence.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    trees: RwLock<Map<TreeKey, TreeState>>,
    locks: RwLock<Map<SessionId, UpdateLock>>,
    records: RwLock<Map<RecordKey, LeafBatchRecord>>,
}

impl MemoryStorage {
    /// Creates a new, empty in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of trees stored.
    pub fn tree_count(&self) -> Result<usize, StorageError> {
        Ok(self.trees.read()?.len())
    }

    /// Returns the number of open update sessions.
    pub fn lock_count(&self) -> Result<usize, StorageError> {
        Ok(self.locks.read()?.len())
    }

    /// Returns the number of queued records, inserted or not.
    pub fn record_count(&self) -> Result<usize, StorageError> {
        Ok(self.records.read()?.len())
    }
}

impl TreeStorage for MemoryStorage {
    fn get_tree(&self, key: &TreeKey) -> Result<Option<TreeState>, StorageError> {
        Ok(self.trees.read()?.get(key).cloned())
    }

    fn get_lock(&self, session: &SessionId) -> Result<Option<UpdateLock>, StorageError> {
        Ok(self.locks.read()?.get(session).cloned())
    }

    fn get_record(&self, key: &RecordKey) -> Result<Option<LeafBatchRecord>, StorageError> {
        Ok(self.records.read()?.get(key).cloned())
    }

    fn get_records(
        &self,
        keys: &[RecordKey],
    ) -> Result<Vec<Option<LeafBatchRecord>>, StorageError> {
        let records = self.records.read()?;
        Ok(keys.iter().map(|key| records.get(key).cloned()).collect())
    }

    fn apply(&self, updates: StorageUpdates) -> Result<(), StorageError> {
        // acquire every guard up front; nothing is written if any lock is poisoned
        let mut trees = self.trees.write()?;
        let mut locks = self.locks.write()?;
        let mut records = self.records.write()?;

        let StorageUpdateParts { tree_updates, lock_updates, record_updates } =
            updates.into_parts();

        trees.extend(tree_updates);
        for (session, maybe_lock) in lock_updates {
            match maybe_lock {
                Some(lock) => locks.insert(session, lock),
                None => locks.remove(&session),
            };
        }
        records.extend(record_updates);

        Ok(())
    }
}
