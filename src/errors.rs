use thiserror::Error;

use crate::{CoordinatorId, RecordKey, SessionId, TreeKey, storage::StorageError};

// TREE UPDATE ERROR
// ================================================================================================

/// Errors returned by the update protocol.
///
/// Every error is raised before the failing step writes anything, so the stored state is exactly
/// as it was before the call.
#[derive(Debug, Error)]
pub enum TreeUpdateError {
    #[error("tree {tree_key} is locked by session {session}")]
    AlreadyLocked { tree_key: TreeKey, session: SessionId },
    #[error("batch must start at leaf {expected} but starts at leaf {found}")]
    OutOfOrderBatch { expected: u64, found: u64 },
    #[error("expected tree {expected}, found tree {found}")]
    WrongTree { expected: TreeKey, found: TreeKey },
    #[error("caller {caller} is not authorized to perform this operation")]
    Unauthorized { caller: CoordinatorId },
    #[error("session {0} has not finished hashing its batch")]
    NotReadyToCommit(SessionId),
    #[error("record {0} has already been inserted")]
    LeafAlreadyInserted(RecordKey),
    #[error("tree {0} does not exist")]
    UnknownTree(TreeKey),
    #[error("tree {0} already exists")]
    TreeAlreadyExists(TreeKey),
    #[error("record {0} does not exist")]
    UnknownRecord(RecordKey),
    #[error("record {0} appears more than once in the batch")]
    DuplicateRecord(RecordKey),
    #[error("batch must contain at least one record")]
    EmptyBatch,
    #[error("batch of {len} records exceeds the maximum of {max}")]
    BatchTooLarge { len: usize, max: usize },
    #[error(
        "cannot add {requested} leaves at index {next_index} to a tree with capacity {capacity}"
    )]
    TreeFull { next_index: u64, requested: u64, capacity: u64 },
    #[error("session {0} does not exist")]
    NoSession(SessionId),
    #[error("tree {0} has no open session")]
    NotLocked(TreeKey),
    #[error("session lease runs until {expires_at}, current time is {now}")]
    LockNotExpired { expires_at: u64, now: u64 },
    #[error("tree height must be between 1 and 32, found {0}")]
    InvalidHeight(u8),
    #[error("root history must hold at least one root, found capacity {0}")]
    InvalidHistorySize(usize),
    #[error("storage error")]
    Storage(#[from] StorageError),
}

impl TreeUpdateError {
    /// Returns `true` if the same call may succeed later without the caller changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::AlreadyLocked { .. } | Self::NotReadyToCommit(_) | Self::LockNotExpired { .. }
        )
    }
}
