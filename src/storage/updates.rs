use crate::{
    LeafBatchRecord, Map, RecordKey, SessionId, TreeKey, TreeState, session::UpdateLock,
};

/// Owned decomposition of a [`StorageUpdates`] batch into its constituent parts.
#[derive(Debug)]
pub struct StorageUpdateParts {
    /// Trees to insert or overwrite.
    pub tree_updates: Map<TreeKey, TreeState>,

    /// Session records keyed by session identity.
    ///
    /// `Some(lock)` indicates an insertion or update, while `None` indicates deletion.
    pub lock_updates: Map<SessionId, Option<UpdateLock>>,

    /// Leaf batch records to insert or overwrite.
    pub record_updates: Map<RecordKey, LeafBatchRecord>,
}

/// A collection of changes to be applied atomically to a tree storage backend.
///
/// Every protocol step produces exactly one batch, so a step either takes effect completely or
/// not at all. Trees and records are never deleted.
#[derive(Default, Debug, Clone)]
pub struct StorageUpdates {
    tree_updates: Map<TreeKey, TreeState>,
    lock_updates: Map<SessionId, Option<UpdateLock>>,
    record_updates: Map<RecordKey, LeafBatchRecord>,
}

impl StorageUpdates {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tree insertion/update to the batch.
    pub fn insert_tree(&mut self, tree: TreeState) {
        self.tree_updates.insert(tree.key(), tree);
    }

    /// Adds a session insertion/update to the batch.
    pub fn insert_lock(&mut self, lock: UpdateLock) {
        self.lock_updates.insert(lock.session(), Some(lock));
    }

    /// Adds a session removal to the batch.
    pub fn remove_lock(&mut self, session: SessionId) {
        self.lock_updates.insert(session, None);
    }

    /// Adds a leaf batch record insertion/update to the batch.
    pub fn insert_record(&mut self, record: LeafBatchRecord) {
        self.record_updates.insert(record.key(), record);
    }

    /// Returns true if this update batch contains no changes.
    pub fn is_empty(&self) -> bool {
        self.tree_updates.is_empty()
            && self.lock_updates.is_empty()
            && self.record_updates.is_empty()
    }

    pub fn tree_updates(&self) -> &Map<TreeKey, TreeState> {
        &self.tree_updates
    }

    pub fn lock_updates(&self) -> &Map<SessionId, Option<UpdateLock>> {
        &self.lock_updates
    }

    pub fn record_updates(&self) -> &Map<RecordKey, LeafBatchRecord> {
        &self.record_updates
    }

    /// Consumes this `StorageUpdates` and returns its owned parts.
    pub fn into_parts(self) -> StorageUpdateParts {
        StorageUpdateParts {
            tree_updates: self.tree_updates,
            lock_updates: self.lock_updates,
            record_updates: self.record_updates,
        }
    }
}
