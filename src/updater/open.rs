use tracing::{info, instrument, warn};

use super::TreeUpdater;
use crate::{
    CoordinatorId, RecordKey, Set, TreeKey, TreeUpdateError,
    clock::Clock,
    session::{LockedRecord, SessionHandle, UpdateLock},
    storage::{StorageUpdates, TreeStorage},
    tree::LockMarker,
};

impl<S: TreeStorage, C: Clock> TreeUpdater<S, C> {
    /// Opens an update session inserting `batch` into the tree identified by `tree_key`.
    ///
    /// The session is bound to `coordinator`: only that caller may advance, commit or release it.
    /// The leaves of every record are copied into the session. Only the first record's index is
    /// checked against the tree; the records after it are inserted at consecutive indices
    /// regardless of the indices they were queued with.
    ///
    /// # Errors
    /// Checked in this order, before anything is written:
    /// - [TreeUpdateError::UnknownTree] if the tree does not exist.
    /// - [TreeUpdateError::AlreadyLocked] if the tree already has an open session.
    /// - [TreeUpdateError::EmptyBatch], [TreeUpdateError::BatchTooLarge] or
    ///   [TreeUpdateError::DuplicateRecord] if the batch is malformed.
    /// - [TreeUpdateError::UnknownRecord] if a record does not exist.
    /// - [TreeUpdateError::WrongTree] if a record was queued for another tree.
    /// - [TreeUpdateError::OutOfOrderBatch] if the first record does not start at the tree's next
    ///   index.
    /// - [TreeUpdateError::TreeFull] if the batch does not fit into the tree.
    #[instrument(skip_all, fields(tree = %tree_key, coordinator = %coordinator))]
    pub fn open_session(
        &self,
        tree_key: TreeKey,
        coordinator: CoordinatorId,
        batch: &[RecordKey],
    ) -> Result<SessionHandle, TreeUpdateError> {
        let _step = self.begin_step()?;

        let mut tree = self.tree(tree_key)?;
        if let Some(marker) = tree.lock() {
            return Err(TreeUpdateError::AlreadyLocked { tree_key, session: marker.session });
        }

        if batch.is_empty() {
            return Err(TreeUpdateError::EmptyBatch);
        }
        let max = self.config.max_batch_records();
        if batch.len() > max {
            return Err(TreeUpdateError::BatchTooLarge { len: batch.len(), max });
        }
        let mut seen = Set::new();
        if let Some(duplicate) = batch.iter().find(|key| !seen.insert(**key)) {
            return Err(TreeUpdateError::DuplicateRecord(*duplicate));
        }

        let records = self
            .storage
            .get_records(batch)?
            .into_iter()
            .zip(batch)
            .map(|(record, key)| record.ok_or(TreeUpdateError::UnknownRecord(*key)))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(foreign) = records.iter().find(|record| record.tree_key() != tree_key) {
            return Err(TreeUpdateError::WrongTree {
                expected: tree_key,
                found: foreign.tree_key(),
            });
        }

        let first_leaf_index = records[0].left_leaf_index();
        if first_leaf_index != tree.next_index() {
            return Err(TreeUpdateError::OutOfOrderBatch {
                expected: tree.next_index(),
                found: first_leaf_index,
            });
        }
        for (i, record) in records.iter().enumerate().skip(1) {
            let derived = first_leaf_index + 2 * i as u64;
            if record.left_leaf_index() != derived {
                warn!(
                    record = %record.key(),
                    derived,
                    "record queued at a different index is inserted at its position in the batch"
                );
            }
        }

        let leaf_count = 2 * records.len() as u64;
        if !tree.has_room_for(leaf_count) {
            return Err(TreeUpdateError::TreeFull {
                next_index: tree.next_index(),
                requested: leaf_count,
                capacity: tree.capacity(),
            });
        }

        let opened_at = self.clock.now();
        let locked = records.iter().map(LockedRecord::from).collect();
        let lock = UpdateLock::open(&tree, coordinator, locked, opened_at);
        let handle = lock.handle();
        tree.set_lock(LockMarker { session: handle.session, opened_at });

        let mut updates = StorageUpdates::new();
        updates.insert_tree(tree);
        updates.insert_lock(lock);
        self.storage.apply(updates)?;

        info!(session = %handle.session, first_leaf_index, records = batch.len(), "opened session");
        Ok(handle)
    }
}
