use super::{
    DEFAULT_ROOT_HISTORY_SIZE, DEFAULT_TREE_HEIGHT, EmptySubtreeRoots, MAX_TREE_HEIGHT, RootHistory,
};
use crate::{
    Digest, HashFunction, SessionId, TreeKey, TreeUpdateError,
    digest::{read_digests, write_digests},
    utils::{
        ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable, read_flag,
        write_flag,
    },
};

// TREE PARAMETERS
// ================================================================================================

/// Parameters fixed when a tree is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct TreeParams {
    /// Number of levels between the leaves and the root.
    pub height: u8,
    /// Hash function used to combine nodes.
    pub hash_function: HashFunction,
    /// Number of historical roots kept.
    pub root_history_size: usize,
}

impl TreeParams {
    /// Sets the height of the tree.
    pub fn with_height(mut self, height: u8) -> Self {
        self.height = height;
        self
    }

    /// Sets the hash function of the tree.
    pub fn with_hash_function(mut self, hash_function: HashFunction) -> Self {
        self.hash_function = hash_function;
        self
    }

    /// Sets the capacity of the root history.
    pub fn with_root_history_size(mut self, size: usize) -> Self {
        self.root_history_size = size;
        self
    }
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            height: DEFAULT_TREE_HEIGHT,
            hash_function: HashFunction::default(),
            root_history_size: DEFAULT_ROOT_HISTORY_SIZE,
        }
    }
}

// LOCK MARKER
// ================================================================================================

/// Marks a tree as pinned by an open update session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockMarker {
    /// The session holding the tree.
    pub session: SessionId,
    /// Clock reading when the session was opened.
    pub opened_at: u64,
}

// TREE STATE
// ================================================================================================

/// The durable record of one commitment tree.
///
/// The tree is append-only. Leaves `0..next_index` are committed; the frontier
/// (`filled_subtrees`) keeps, for every level, the most recent node that was a left child, which
/// is all that is needed to extend the tree without the leaves themselves.
///
/// A tree is mutated only by committing an update session; queueing leaves only reserves leaf
/// indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeState {
    key: TreeKey,
    height: u8,
    hash_function: HashFunction,
    next_index: u64,
    next_queue_index: u64,
    filled_subtrees: Vec<Digest>,
    roots: RootHistory,
    lock: Option<LockMarker>,
}

impl TreeState {
    // CONSTRUCTORS
    // --------------------------------------------------------------------------------------------

    /// Creates an empty tree whose root history holds the empty-tree root.
    ///
    /// # Errors
    /// - [TreeUpdateError::InvalidHeight] if the height is zero or above [MAX_TREE_HEIGHT].
    /// - [TreeUpdateError::InvalidHistorySize] if the root history would hold no roots.
    pub fn new(key: TreeKey, params: TreeParams) -> Result<Self, TreeUpdateError> {
        if params.height == 0 || params.height > MAX_TREE_HEIGHT {
            return Err(TreeUpdateError::InvalidHeight(params.height));
        }
        if params.root_history_size == 0 {
            return Err(TreeUpdateError::InvalidHistorySize(params.root_history_size));
        }

        let zeros = EmptySubtreeRoots::compute(params.hash_function, params.height);
        let height = params.height as usize;

        Ok(Self {
            key,
            height: params.height,
            hash_function: params.hash_function,
            next_index: 0,
            next_queue_index: 0,
            filled_subtrees: zeros[..height].to_vec(),
            roots: RootHistory::new(params.root_history_size, zeros[height]),
            lock: None,
        })
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    pub fn key(&self) -> TreeKey {
        self.key
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn hash_function(&self) -> HashFunction {
        self.hash_function
    }

    /// Returns the next unused leaf slot.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Returns the left-leaf index the next queued record will receive.
    pub fn next_queue_index(&self) -> u64 {
        self.next_queue_index
    }

    /// Returns the number of leaves the tree can hold.
    pub fn capacity(&self) -> u64 {
        1u64 << self.height
    }

    /// Returns the frontier: for every level, the latest node that was a left child.
    pub fn filled_subtrees(&self) -> &[Digest] {
        &self.filled_subtrees
    }

    pub fn roots(&self) -> &RootHistory {
        &self.roots
    }

    /// Returns the newest root and the ring buffer slot holding it.
    pub fn current_root(&self) -> (Digest, usize) {
        (self.roots.current(), self.roots.current_index())
    }

    /// Returns the marker of the session currently pinning this tree, if any.
    pub fn lock(&self) -> Option<LockMarker> {
        self.lock
    }

    /// Returns `true` if `leaf_count` more leaves fit after the committed ones.
    pub fn has_room_for(&self, leaf_count: u64) -> bool {
        self.next_index
            .checked_add(leaf_count)
            .is_some_and(|end| end <= self.capacity())
    }

    /// Recomputes the current root from the frontier.
    ///
    /// At every committed state this equals [Self::current_root]. Returns `None` for a full tree,
    /// whose rightmost subtrees are not recorded in the frontier.
    pub fn frontier_root(&self) -> Option<Digest> {
        if self.next_index >= self.capacity() {
            return None;
        }
        let zeros = EmptySubtreeRoots::compute(self.hash_function, self.height);
        let mut current = zeros[0];
        for level in 0..self.height as usize {
            current = if (self.next_index >> level) & 1 == 1 {
                self.hash_function.merge(self.filled_subtrees[level], current)
            } else {
                self.hash_function.merge(current, zeros[level])
            };
        }
        Some(current)
    }

    // STATE MUTATORS
    // --------------------------------------------------------------------------------------------

    /// Reserves the index of the next two-leaf record queued for this tree.
    pub(crate) fn reserve_queue_index(&mut self) -> Result<u64, TreeUpdateError> {
        let index = self.next_queue_index;
        match index.checked_add(2) {
            Some(end) if end <= self.capacity() => {
                self.next_queue_index = end;
                Ok(index)
            },
            _ => Err(TreeUpdateError::TreeFull {
                next_index: index,
                requested: 2,
                capacity: self.capacity(),
            }),
        }
    }

    pub(crate) fn set_lock(&mut self, marker: LockMarker) {
        self.lock = Some(marker);
    }

    pub(crate) fn clear_lock(&mut self) {
        self.lock = None;
    }

    /// Records the result of a committed session: pushes `root`, installs the session's frontier
    /// and advances the next index by `leaf_count`. Returns the new current root slot.
    pub(crate) fn apply_commit(
        &mut self,
        root: Digest,
        frontier: Vec<Digest>,
        leaf_count: u64,
    ) -> usize {
        debug_assert_eq!(frontier.len(), self.height as usize);
        self.filled_subtrees = frontier;
        self.next_index += leaf_count;
        self.next_queue_index = self.next_queue_index.max(self.next_index);
        self.roots.push(root)
    }
}

// SERIALIZATION
// ================================================================================================

impl Serializable for LockMarker {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.session.write_into(target);
        target.write_u64(self.opened_at);
    }
}

impl Deserializable for LockMarker {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let session = SessionId::read_from(source)?;
        let opened_at = source.read_u64()?;
        Ok(Self { session, opened_at })
    }
}

impl Serializable for TreeState {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.key.write_into(target);
        target.write_u8(self.height);
        self.hash_function.write_into(target);
        target.write_u64(self.next_index);
        target.write_u64(self.next_queue_index);
        write_digests(target, &self.filled_subtrees);
        self.roots.write_into(target);
        write_flag(target, self.lock.is_some());
        if let Some(marker) = &self.lock {
            marker.write_into(target);
        }
    }
}

impl Deserializable for TreeState {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let key = TreeKey::read_from(source)?;
        let height = source.read_u8()?;
        let hash_function = HashFunction::read_from(source)?;
        let next_index = source.read_u64()?;
        let next_queue_index = source.read_u64()?;
        let filled_subtrees = read_digests(source)?;
        let roots = RootHistory::read_from(source)?;
        let lock = if read_flag(source)? { Some(LockMarker::read_from(source)?) } else { None };

        if height == 0 || height > MAX_TREE_HEIGHT || filled_subtrees.len() != height as usize {
            return Err(DeserializationError::InvalidValue(format!(
                "tree of height {height} cannot have a frontier of {} nodes",
                filled_subtrees.len()
            )));
        }

        Ok(Self {
            key,
            height,
            hash_function,
            next_index,
            next_queue_index,
            filled_subtrees,
            roots,
            lock,
        })
    }
}
