use core::fmt::{self, Display};

use super::{BatchContext, Checkpoint, steps_for_ops};
use crate::{
    CoordinatorId, Digest, HashFunction, LeafBatchRecord, RecordKey, SessionId, TreeKey,
    TreeState,
    tree::EmptySubtreeRoots,
    utils::{ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable},
};

// PHASE
// ================================================================================================

/// Lifecycle phase of an open update session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Phase {
    /// The new root is still being computed.
    Hashing,
    /// The new root is known; the session is waiting to be committed.
    ReadyToCommit,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hashing => f.write_str("hashing"),
            Self::ReadyToCommit => f.write_str("ready to commit"),
        }
    }
}

// SESSION HANDLE
// ================================================================================================

/// What a coordinator holds on to between the steps of a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct SessionHandle {
    pub session: SessionId,
    pub tree_key: TreeKey,
}

impl SessionHandle {
    /// Returns the handle of the session `coordinator` would hold on `tree_key`.
    pub fn new(tree_key: TreeKey, coordinator: CoordinatorId) -> Self {
        Self {
            session: SessionId::derive(tree_key, coordinator),
            tree_key,
        }
    }
}

// LOCKED RECORD
// ================================================================================================

/// A queued record captured by a session, with its leaves copied at open time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LockedRecord {
    pub key: RecordKey,
    pub leaves: [Digest; 2],
}

impl From<&LeafBatchRecord> for LockedRecord {
    fn from(record: &LeafBatchRecord) -> Self {
        Self { key: record.key(), leaves: record.leaves() }
    }
}

// UPDATE LOCK
// ================================================================================================

/// The record of an open update session.
///
/// A session pins one tree for one coordinator and carries everything needed to resume hashing
/// its batch: the leaves themselves, the index the first leaf lands at and the [Checkpoint].
/// Leaf indices after the first are derived as `first_leaf_index + 2 * i` rather than read from
/// the records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateLock {
    session: SessionId,
    coordinator: CoordinatorId,
    tree_key: TreeKey,
    height: u8,
    hash_function: HashFunction,
    first_leaf_index: u64,
    batch: Vec<LockedRecord>,
    checkpoint: Checkpoint,
    phase: Phase,
    opened_at: u64,
}

impl UpdateLock {
    /// Opens a session for `coordinator` inserting `batch` at the end of `tree`.
    ///
    /// The checkpoint starts from the tree's frontier. Callers are responsible for validating
    /// the batch against the tree.
    pub fn open(
        tree: &TreeState,
        coordinator: CoordinatorId,
        batch: Vec<LockedRecord>,
        opened_at: u64,
    ) -> Self {
        let checkpoint = Checkpoint::new(tree.filled_subtrees().to_vec(), batch.len());
        Self {
            session: SessionId::derive(tree.key(), coordinator),
            coordinator,
            tree_key: tree.key(),
            height: tree.height(),
            hash_function: tree.hash_function(),
            first_leaf_index: tree.next_index(),
            batch,
            checkpoint,
            phase: Phase::Hashing,
            opened_at,
        }
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle { session: self.session, tree_key: self.tree_key }
    }

    /// Returns the only caller allowed to drive this session.
    pub fn coordinator(&self) -> CoordinatorId {
        self.coordinator
    }

    pub fn tree_key(&self) -> TreeKey {
        self.tree_key
    }

    pub fn first_leaf_index(&self) -> u64 {
        self.first_leaf_index
    }

    pub fn batch(&self) -> &[LockedRecord] {
        &self.batch
    }

    /// Returns the keys of the batch records, in insertion order.
    pub fn record_keys(&self) -> Vec<RecordKey> {
        self.batch.iter().map(|record| record.key).collect()
    }

    /// Returns the number of leaves the batch inserts.
    pub fn leaf_count(&self) -> u64 {
        2 * self.batch.len() as u64
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn opened_at(&self) -> u64 {
        self.opened_at
    }

    /// Returns the new root once hashing is complete.
    pub fn root(&self) -> Option<Digest> {
        self.checkpoint.root()
    }

    /// Returns how many more steps of `quantum` operations the session needs.
    pub fn steps_remaining(&self, quantum: usize) -> u64 {
        steps_for_ops(self.checkpoint.remaining_ops(), quantum)
    }

    // PROGRESS
    // --------------------------------------------------------------------------------------------

    /// Performs up to `quantum` hash operations and returns the resulting phase.
    pub fn advance(&mut self, quantum: usize) -> Phase {
        if self.phase == Phase::ReadyToCommit {
            return self.phase;
        }

        let zeros = EmptySubtreeRoots::compute(self.hash_function, self.height);
        let leaves: Vec<[Digest; 2]> = self.batch.iter().map(|record| record.leaves).collect();
        let ctx = BatchContext {
            hash_function: self.hash_function,
            leaves: &leaves,
            first_leaf_index: self.first_leaf_index,
            zeros: &zeros,
        };

        self.checkpoint.advance(&ctx, quantum.max(1));
        if self.checkpoint.is_complete() {
            self.phase = Phase::ReadyToCommit;
        }
        self.phase
    }

    /// Consumes the session and returns the new root and the new frontier, or `None` if hashing
    /// is not complete.
    pub(crate) fn into_commit_parts(self) -> Option<(Digest, Vec<Digest>)> {
        let root = self.checkpoint.root()?;
        Some((root, self.checkpoint.into_frontier()))
    }
}

// SERIALIZATION
// ================================================================================================

impl Serializable for Phase {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_u8(match self {
            Self::Hashing => 0,
            Self::ReadyToCommit => 1,
        });
    }
}

impl Deserializable for Phase {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        match source.read_u8()? {
            0 => Ok(Self::Hashing),
            1 => Ok(Self::ReadyToCommit),
            other => Err(DeserializationError::InvalidValue(format!("unknown phase tag {other}"))),
        }
    }
}

impl Serializable for LockedRecord {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.key.write_into(target);
        self.leaves[0].write_into(target);
        self.leaves[1].write_into(target);
    }
}

impl Deserializable for LockedRecord {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let key = RecordKey::read_from(source)?;
        let leaves = [Digest::read_from(source)?, Digest::read_from(source)?];
        Ok(Self { key, leaves })
    }
}

impl Serializable for UpdateLock {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.session.write_into(target);
        self.coordinator.write_into(target);
        self.tree_key.write_into(target);
        target.write_u8(self.height);
        self.hash_function.write_into(target);
        target.write_u64(self.first_leaf_index);
        target.write_u32(self.batch.len() as u32);
        for record in &self.batch {
            record.write_into(target);
        }
        self.checkpoint.write_into(target);
        self.phase.write_into(target);
        target.write_u64(self.opened_at);
    }
}

impl Deserializable for UpdateLock {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let session = SessionId::read_from(source)?;
        let coordinator = CoordinatorId::read_from(source)?;
        let tree_key = TreeKey::read_from(source)?;
        let height = source.read_u8()?;
        let hash_function = HashFunction::read_from(source)?;
        let first_leaf_index = source.read_u64()?;
        let batch_len = source.read_u32()? as usize;
        let batch = (0..batch_len)
            .map(|_| LockedRecord::read_from(source))
            .collect::<Result<Vec<_>, _>>()?;
        let checkpoint = Checkpoint::read_from(source)?;
        let phase = Phase::read_from(source)?;
        let opened_at = source.read_u64()?;

        if checkpoint.frontier().len() != height as usize
            || checkpoint.total_ops() != batch.len() as u64 * height as u64
            || (phase == Phase::ReadyToCommit) != checkpoint.is_complete()
            || !checkpoint.is_consistent(batch.len(), first_leaf_index)
        {
            return Err(DeserializationError::InvalidValue(format!(
                "session {session} does not match its checkpoint"
            )));
        }

        Ok(Self {
            session,
            coordinator,
            tree_key,
            height,
            hash_function,
            first_leaf_index,
            batch,
            checkpoint,
            phase,
            opened_at,
        })
    }
}
