use crate::{
    Digest, HashFunction,
    digest::{read_digests, write_digests},
    utils::{
        ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable, read_flag,
        write_flag,
    },
};

// HASHING CONTEXT
// ================================================================================================

/// Everything a checkpoint needs besides its own state to perform one hash operation.
///
/// The context is rebuilt from the session record on every step; only the [Checkpoint] is
/// persisted between steps.
#[derive(Debug, Clone, Copy)]
pub struct BatchContext<'a> {
    pub hash_function: HashFunction,
    /// Leaf pairs of the batch, in insertion order.
    pub leaves: &'a [[Digest; 2]],
    /// Tree index of the left leaf of the first pair.
    pub first_leaf_index: u64,
    /// Empty subtree roots for levels `0..=height`.
    pub zeros: &'a [Digest],
}

impl BatchContext<'_> {
    fn height(&self) -> u8 {
        (self.zeros.len() - 1) as u8
    }
}

// CHECKPOINT
// ================================================================================================

/// Resumable progress of hashing a batch into a tree.
///
/// The batch is processed one leaf pair at a time. For each pair, the first operation merges the
/// two leaves and every following operation climbs one level, combining the running node either
/// with the frontier (when the node is a right child) or with an empty subtree (when it is a left
/// child, in which case it also becomes the new frontier entry of its level). A pair costs exactly
/// `height` operations, and after the last operation of the last pair the running node is the new
/// root.
///
/// Operations only depend on the checkpoint and the [BatchContext], so the result is the same no
/// matter how the work is split across steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Index of the pair currently being hashed.
    pair: u32,
    /// Level of `level_hash`; `0` means the current pair has not been hashed yet.
    level: u8,
    /// Position of `level_hash` within its level.
    node_index: u64,
    /// The running node of the current pair.
    level_hash: Digest,
    /// Per-level latest left-hand nodes, seeded from the tree and updated as the batch is hashed.
    frontier: Vec<Digest>,
    ops_done: u64,
    total_ops: u64,
    /// Set once every pair has reached the top of the tree.
    root: Option<Digest>,
}

impl Checkpoint {
    /// Returns a checkpoint at the start of a batch of `pair_count` leaf pairs, extending a tree
    /// whose frontier is `frontier`.
    pub fn new(frontier: Vec<Digest>, pair_count: usize) -> Self {
        let height = frontier.len() as u64;
        Self {
            pair: 0,
            level: 0,
            node_index: 0,
            level_hash: Digest::default(),
            frontier,
            ops_done: 0,
            total_ops: pair_count as u64 * height,
            root: None,
        }
    }

    // PUBLIC ACCESSORS
    // --------------------------------------------------------------------------------------------

    /// Returns the number of hash operations performed so far.
    pub fn ops_done(&self) -> u64 {
        self.ops_done
    }

    /// Returns the number of hash operations the whole batch takes.
    pub fn total_ops(&self) -> u64 {
        self.total_ops
    }

    pub fn remaining_ops(&self) -> u64 {
        self.total_ops - self.ops_done
    }

    pub fn is_complete(&self) -> bool {
        self.root.is_some()
    }

    /// Returns the new tree root, once every pair has been hashed.
    pub fn root(&self) -> Option<Digest> {
        self.root
    }

    /// Returns the frontier as of the last completed operation.
    pub fn frontier(&self) -> &[Digest] {
        &self.frontier
    }

    pub fn into_frontier(self) -> Vec<Digest> {
        self.frontier
    }

    /// Returns `true` if the cursor points into a batch of `pair_count` pairs whose first left
    /// leaf sits at `first_leaf_index`, and the operation count agrees with the cursor.
    pub(crate) fn is_consistent(&self, pair_count: usize, first_leaf_index: u64) -> bool {
        let height = self.frontier.len() as u64;
        let pair = self.pair as u64;

        let cursor_in_batch = if self.is_complete() {
            self.pair as usize == pair_count && self.level == 0
        } else {
            (self.pair as usize) < pair_count
        };
        let node_in_place = self.level == 0
            || (first_leaf_index / 2 + pair).checked_shr(u32::from(self.level - 1)).unwrap_or(0)
                == self.node_index;

        height > 0
            && cursor_in_batch
            && node_in_place
            && self.ops_done == pair * height + self.level as u64
            && self.is_complete() == (self.ops_done == self.total_ops)
    }

    // PROGRESS
    // --------------------------------------------------------------------------------------------

    /// Performs up to `quantum` hash operations and returns how many were performed.
    ///
    /// Does nothing once the checkpoint is complete.
    pub fn advance(&mut self, ctx: &BatchContext<'_>, quantum: usize) -> usize {
        let mut performed = 0;
        while performed < quantum && !self.is_complete() {
            self.hash_once(ctx);
            performed += 1;
        }
        performed
    }

    /// Performs exactly one hash operation.
    fn hash_once(&mut self, ctx: &BatchContext<'_>) {
        debug_assert!(self.root.is_none());
        let pair = self.pair as usize;

        if self.level == 0 {
            let [left, right] = ctx.leaves[pair];
            let left_index = ctx.first_leaf_index + 2 * pair as u64;
            self.level_hash = ctx.hash_function.merge(left, right);
            self.frontier[0] = left;
            self.node_index = left_index / 2;
            self.level = 1;
        } else {
            let level = self.level as usize;
            self.level_hash = if self.node_index % 2 == 0 {
                self.frontier[level] = self.level_hash;
                ctx.hash_function.merge(self.level_hash, ctx.zeros[level])
            } else {
                ctx.hash_function.merge(self.frontier[level], self.level_hash)
            };
            self.node_index /= 2;
            self.level += 1;
        }
        self.ops_done += 1;

        if self.level == ctx.height() {
            if pair + 1 == ctx.leaves.len() {
                self.root = Some(self.level_hash);
            }
            self.pair += 1;
            self.level = 0;
        }
    }
}

// SERIALIZATION
// ================================================================================================

impl Serializable for Checkpoint {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        target.write_u32(self.pair);
        target.write_u8(self.level);
        target.write_u64(self.node_index);
        self.level_hash.write_into(target);
        write_digests(target, &self.frontier);
        target.write_u64(self.ops_done);
        target.write_u64(self.total_ops);
        write_flag(target, self.root.is_some());
        if let Some(root) = &self.root {
            root.write_into(target);
        }
    }
}

impl Deserializable for Checkpoint {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let pair = source.read_u32()?;
        let level = source.read_u8()?;
        let node_index = source.read_u64()?;
        let level_hash = Digest::read_from(source)?;
        let frontier = read_digests(source)?;
        let ops_done = source.read_u64()?;
        let total_ops = source.read_u64()?;
        let root = if read_flag(source)? { Some(Digest::read_from(source)?) } else { None };

        if ops_done > total_ops || level as usize >= frontier.len().max(1) {
            return Err(DeserializationError::InvalidValue(format!(
                "inconsistent checkpoint: {ops_done}/{total_ops} operations at level {level}"
            )));
        }

        Ok(Self {
            pair,
            level,
            node_index,
            level_hash,
            frontier,
            ops_done,
            total_ops,
            root,
        })
    }
}
