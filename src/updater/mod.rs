//! The update protocol: queueing leaves, driving sessions and committing roots.

use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, instrument, warn};

use crate::{
    CoordinatorId, Digest, LeafBatchRecord, RecordKey, TreeKey, TreeParams, TreeState,
    TreeUpdateError, UpdaterConfig,
    clock::{Clock, SystemClock},
    session::{Phase, SessionHandle, UpdateLock},
    storage::{StorageError, StorageUpdates, TreeStorage},
};

mod commit;
mod open;


// TREE UPDATER
// ================================================================================================

/// Drives the checkpointed insertion protocol over a [TreeStorage] backend.
///
/// A batch of queued leaf pairs is inserted in three stages:
/// 1. [open_session](Self::open_session) pins the tree for one coordinator and captures the batch.
/// 2. [advance](Self::advance) performs a bounded amount of hashing per call and persists the
///    checkpoint; it is called until the session is [Phase::ReadyToCommit].
/// 3. [commit_root](Self::commit_root) publishes the new root, marks the records inserted and
///    releases the tree.
///
/// Each call is one indivisible step: it validates everything first and then writes a single
/// atomic [StorageUpdates] batch. Steps are serialized by an internal mutex, so any number of
/// threads may share one updater. All protocol state lives in storage, so an updater created over
/// the same storage later resumes open sessions exactly where they stopped.
#[derive(Debug)]
pub struct TreeUpdater<S: TreeStorage, C: Clock = SystemClock> {
    storage: S,
    clock: C,
    config: UpdaterConfig,
    step: Mutex<()>,
}

impl<S: TreeStorage> TreeUpdater<S> {
    /// Creates an updater reading time from the system clock.
    pub fn new(storage: S, config: UpdaterConfig) -> Self {
        Self::with_clock(storage, config, SystemClock)
    }
}

impl<S: TreeStorage, C: Clock> TreeUpdater<S, C> {
    // CONSTRUCTORS
    // --------------------------------------------------------------------------------------------

    pub fn with_clock(storage: S, config: UpdaterConfig, clock: C) -> Self {
        Self { storage, clock, config, step: Mutex::new(()) }
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Consumes the updater and returns its storage.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Returns the state of the tree identified by `tree_key`.
    pub fn tree(&self, tree_key: TreeKey) -> Result<TreeState, TreeUpdateError> {
        self.storage.get_tree(&tree_key)?.ok_or(TreeUpdateError::UnknownTree(tree_key))
    }

    /// Returns the newest root of a tree and the root history slot it occupies.
    pub fn current_root(&self, tree_key: TreeKey) -> Result<(Digest, usize), TreeUpdateError> {
        Ok(self.tree(tree_key)?.current_root())
    }

    /// Returns the index the next inserted leaf of a tree will occupy.
    pub fn next_index(&self, tree_key: TreeKey) -> Result<u64, TreeUpdateError> {
        Ok(self.tree(tree_key)?.next_index())
    }

    /// Returns `true` if `root` is among the recent roots of the tree.
    pub fn is_known_root(&self, tree_key: TreeKey, root: &Digest) -> Result<bool, TreeUpdateError> {
        Ok(self.tree(tree_key)?.roots().contains(root))
    }

    /// Returns the session record behind `handle`.
    pub fn session(&self, handle: &SessionHandle) -> Result<UpdateLock, TreeUpdateError> {
        self.storage
            .get_lock(&handle.session)?
            .ok_or(TreeUpdateError::NoSession(handle.session))
    }

    /// Returns a queued record.
    pub fn record(&self, key: RecordKey) -> Result<LeafBatchRecord, TreeUpdateError> {
        self.storage.get_record(&key)?.ok_or(TreeUpdateError::UnknownRecord(key))
    }

    /// Returns how many more [advance](Self::advance) calls the session needs.
    pub fn steps_required(&self, handle: &SessionHandle) -> Result<u64, TreeUpdateError> {
        Ok(self.session(handle)?.steps_remaining(self.config.hashes_per_step()))
    }

    // TREES AND QUEUE
    // --------------------------------------------------------------------------------------------

    /// Creates an empty tree.
    ///
    /// # Errors
    /// - [TreeUpdateError::TreeAlreadyExists] if a tree with this key exists.
    /// - [TreeUpdateError::InvalidHeight] or [TreeUpdateError::InvalidHistorySize] for invalid
    ///   parameters.
    #[instrument(skip_all, fields(tree = %key))]
    pub fn create_tree(
        &self,
        key: TreeKey,
        params: TreeParams,
    ) -> Result<TreeState, TreeUpdateError> {
        let _step = self.begin_step()?;

        if self.storage.get_tree(&key)?.is_some() {
            return Err(TreeUpdateError::TreeAlreadyExists(key));
        }
        let tree = TreeState::new(key, params)?;

        let mut updates = StorageUpdates::new();
        updates.insert_tree(tree.clone());
        self.storage.apply(updates)?;

        info!(height = tree.height(), hash = %tree.hash_function(), "created tree");
        Ok(tree)
    }

    /// Queues a pair of leaves for insertion into a tree.
    ///
    /// The record receives the next left-leaf index of the tree's queue. Queueing is allowed
    /// while a session is open; the new record simply belongs to a later batch.
    ///
    /// # Errors
    /// - [TreeUpdateError::UnknownTree] if the tree does not exist.
    /// - [TreeUpdateError::TreeFull] if the queue already covers the whole tree.
    pub fn enqueue(
        &self,
        tree_key: TreeKey,
        leaves: [Digest; 2],
    ) -> Result<LeafBatchRecord, TreeUpdateError> {
        let _step = self.begin_step()?;

        let mut tree = self.tree(tree_key)?;
        let index = tree.reserve_queue_index()?;
        let record = LeafBatchRecord::new(tree_key, index, leaves);

        let mut updates = StorageUpdates::new();
        updates.insert_tree(tree);
        updates.insert_record(record.clone());
        self.storage.apply(updates)?;

        debug!(tree = %tree_key, index, "queued leaf pair");
        Ok(record)
    }

    // HASHING
    // --------------------------------------------------------------------------------------------

    /// Performs one step of hashing for a session and persists the new checkpoint.
    ///
    /// Calling this on a session that is already ready to commit changes nothing and returns
    /// [Phase::ReadyToCommit], so callers may over-provision their step count.
    ///
    /// # Errors
    /// - [TreeUpdateError::NoSession] if the session does not exist.
    /// - [TreeUpdateError::Unauthorized] if `caller` is not the session's coordinator.
    #[instrument(skip_all, fields(session = %handle.session))]
    pub fn advance(
        &self,
        handle: &SessionHandle,
        caller: CoordinatorId,
    ) -> Result<Phase, TreeUpdateError> {
        let _step = self.begin_step()?;

        let mut lock = self.session(handle)?;
        if lock.coordinator() != caller {
            return Err(TreeUpdateError::Unauthorized { caller });
        }
        if lock.phase() == Phase::ReadyToCommit {
            debug!("session already ready to commit");
            return Ok(Phase::ReadyToCommit);
        }

        let phase = lock.advance(self.config.hashes_per_step());
        let checkpoint = lock.checkpoint();
        debug!(done = checkpoint.ops_done(), total = checkpoint.total_ops(), %phase, "advanced");

        let mut updates = StorageUpdates::new();
        updates.insert_lock(lock);
        self.storage.apply(updates)?;

        Ok(phase)
    }

    // RELEASE
    // --------------------------------------------------------------------------------------------

    /// Abandons a session on behalf of its coordinator, in any phase.
    ///
    /// The tree keeps its previous root and its records stay queued.
    ///
    /// # Errors
    /// - [TreeUpdateError::NoSession] if the session does not exist.
    /// - [TreeUpdateError::Unauthorized] if `caller` is not the session's coordinator.
    #[instrument(skip_all, fields(session = %handle.session))]
    pub fn release_session(
        &self,
        handle: &SessionHandle,
        caller: CoordinatorId,
    ) -> Result<(), TreeUpdateError> {
        let _step = self.begin_step()?;

        let lock = self.session(handle)?;
        if lock.coordinator() != caller {
            return Err(TreeUpdateError::Unauthorized { caller });
        }

        let mut updates = StorageUpdates::new();
        if let Some(mut tree) = self.storage.get_tree(&lock.tree_key())? {
            if tree.lock().is_some_and(|marker| marker.session == lock.session()) {
                tree.clear_lock();
                updates.insert_tree(tree);
            }
        }
        updates.remove_lock(lock.session());
        self.storage.apply(updates)?;

        info!(tree = %lock.tree_key(), "released session");
        Ok(())
    }

    /// Reclaims a tree whose session outlived its lease.
    ///
    /// Only the configured authority may do this, and only once `lock_duration` seconds have
    /// passed since the session was opened. The session record is deleted and the tree can be
    /// locked again; the abandoned batch stays queued.
    ///
    /// # Errors
    /// - [TreeUpdateError::Unauthorized] if `authority` is not the configured authority.
    /// - [TreeUpdateError::UnknownTree] if the tree does not exist.
    /// - [TreeUpdateError::NotLocked] if the tree has no open session.
    /// - [TreeUpdateError::LockNotExpired] if the lease is still running.
    #[instrument(skip_all, fields(tree = %tree_key))]
    pub fn force_release(
        &self,
        tree_key: TreeKey,
        authority: CoordinatorId,
    ) -> Result<(), TreeUpdateError> {
        let _step = self.begin_step()?;

        if authority != self.config.authority() {
            return Err(TreeUpdateError::Unauthorized { caller: authority });
        }
        let mut tree = self.tree(tree_key)?;
        let marker = tree.lock().ok_or(TreeUpdateError::NotLocked(tree_key))?;

        let now = self.clock.now();
        let expires_at = marker.opened_at.saturating_add(self.config.lock_duration());
        if now < expires_at {
            return Err(TreeUpdateError::LockNotExpired { expires_at, now });
        }

        tree.clear_lock();
        let mut updates = StorageUpdates::new();
        updates.insert_tree(tree);
        updates.remove_lock(marker.session);
        self.storage.apply(updates)?;

        warn!(session = %marker.session, opened_at = marker.opened_at, "force-released session");
        Ok(())
    }

    // HELPERS
    // --------------------------------------------------------------------------------------------

    /// Serializes protocol steps.
    fn begin_step(&self) -> Result<MutexGuard<'_, ()>, StorageError> {
        Ok(self.step.lock()?)
    }
}
