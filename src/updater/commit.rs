use tracing::{info, instrument};

use super::TreeUpdater;
use crate::{
    CoordinatorId, TreeKey, TreeUpdateError,
    clock::Clock,
    session::{Phase, SessionHandle},
    storage::{StorageUpdates, TreeStorage},
};

impl<S: TreeStorage, C: Clock> TreeUpdater<S, C> {
    /// Publishes the root computed by a finished session.
    ///
    /// In one atomic update the new root is pushed onto the tree's root history, the session's
    /// frontier replaces the tree's, the tree's next index moves past the batch, every record of
    /// the batch is marked inserted and the session is deleted. Returns the root history slot of
    /// the new root.
    ///
    /// # Errors
    /// Checked in this order, before anything is written:
    /// - [TreeUpdateError::NoSession] if the session does not exist.
    /// - [TreeUpdateError::Unauthorized] if `caller` is not the session's coordinator.
    /// - [TreeUpdateError::NotReadyToCommit] if hashing is not complete.
    /// - [TreeUpdateError::WrongTree] if `target_tree` is not the tree the session pins.
    /// - [TreeUpdateError::NoSession] if the tree does not name this session as its lock holder.
    /// - [TreeUpdateError::LeafAlreadyInserted] if any record of the batch was inserted before.
    #[instrument(skip_all, fields(session = %handle.session, tree = %target_tree))]
    pub fn commit_root(
        &self,
        handle: &SessionHandle,
        target_tree: TreeKey,
        caller: CoordinatorId,
    ) -> Result<usize, TreeUpdateError> {
        let _step = self.begin_step()?;

        let lock = self.session(handle)?;
        if lock.coordinator() != caller {
            return Err(TreeUpdateError::Unauthorized { caller });
        }
        if lock.phase() != Phase::ReadyToCommit {
            return Err(TreeUpdateError::NotReadyToCommit(lock.session()));
        }
        if lock.tree_key() != target_tree {
            return Err(TreeUpdateError::WrongTree {
                expected: lock.tree_key(),
                found: target_tree,
            });
        }

        let session = lock.session();
        let mut tree = self
            .storage
            .get_tree(&target_tree)?
            .filter(|tree| tree.lock().is_some_and(|marker| marker.session == session))
            .ok_or(TreeUpdateError::NoSession(session))?;

        let keys = lock.record_keys();
        let mut records = Vec::with_capacity(keys.len());
        for (record, key) in self.storage.get_records(&keys)?.into_iter().zip(&keys) {
            let record = record.ok_or(TreeUpdateError::UnknownRecord(*key))?;
            if record.is_inserted() {
                return Err(TreeUpdateError::LeafAlreadyInserted(*key));
            }
            records.push(record);
        }

        let leaf_count = lock.leaf_count();
        let (root, frontier) =
            lock.into_commit_parts().ok_or(TreeUpdateError::NotReadyToCommit(session))?;

        let root_index = tree.apply_commit(root, frontier, leaf_count);
        tree.clear_lock();
        debug_assert!(tree.frontier_root().is_none_or(|frontier_root| frontier_root == root));

        let next_index = tree.next_index();
        let mut updates = StorageUpdates::new();
        updates.insert_tree(tree);
        for mut record in records {
            record.mark_inserted();
            updates.insert_record(record);
        }
        updates.remove_lock(session);
        self.storage.apply(updates)?;

        info!(%root, root_index, next_index, "committed root");
        Ok(root_index)
    }

    /// Commits a finished session into the tree it was opened on.
    ///
    /// Shorthand for [commit_root](Self::commit_root) targeting `handle.tree_key`.
    pub fn commit(
        &self,
        handle: &SessionHandle,
        caller: CoordinatorId,
    ) -> Result<usize, TreeUpdateError> {
        self.commit_root(handle, handle.tree_key, caller)
    }
}
