//! Pending leaf pairs waiting to be inserted into a commitment tree.

use core::fmt::{self, Display};

use crate::{
    Digest, TreeKey,
    utils::{
        ByteReader, ByteWriter, Deserializable, DeserializationError, Serializable, read_flag,
        write_flag,
    },
};

// RECORD KEY
// ================================================================================================

/// Storage key of a [LeafBatchRecord]: the tree it was queued for and its left leaf index.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RecordKey {
    pub tree_key: TreeKey,
    pub left_leaf_index: u64,
}

impl RecordKey {
    pub const fn new(tree_key: TreeKey, left_leaf_index: u64) -> Self {
        Self { tree_key, left_leaf_index }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.tree_key, self.left_leaf_index)
    }
}

// LEAF BATCH RECORD
// ================================================================================================

/// A queued pair of leaves.
///
/// The left leaf goes to `left_leaf_index` and the right one to the slot after it. The `inserted`
/// flag is set exactly once, when the session carrying the record commits its root.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct LeafBatchRecord {
    tree_key: TreeKey,
    left_leaf_index: u64,
    leaves: [Digest; 2],
    inserted: bool,
}

impl LeafBatchRecord {
    /// Creates a record which has not been inserted yet.
    pub fn new(tree_key: TreeKey, left_leaf_index: u64, leaves: [Digest; 2]) -> Self {
        Self { tree_key, left_leaf_index, leaves, inserted: false }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.tree_key, self.left_leaf_index)
    }

    /// Returns the tree this record was queued for.
    pub fn tree_key(&self) -> TreeKey {
        self.tree_key
    }

    pub fn left_leaf_index(&self) -> u64 {
        self.left_leaf_index
    }

    pub fn leaves(&self) -> [Digest; 2] {
        self.leaves
    }

    /// Returns `true` once the record's leaves are part of a committed root.
    pub fn is_inserted(&self) -> bool {
        self.inserted
    }

    pub(crate) fn mark_inserted(&mut self) {
        debug_assert!(!self.inserted, "record {} inserted twice", self.key());
        self.inserted = true;
    }
}

// SERIALIZATION
// ================================================================================================

impl Serializable for RecordKey {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.tree_key.write_into(target);
        target.write_u64(self.left_leaf_index);
    }
}

impl Deserializable for RecordKey {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let tree_key = TreeKey::read_from(source)?;
        let left_leaf_index = source.read_u64()?;
        Ok(Self { tree_key, left_leaf_index })
    }
}

impl Serializable for LeafBatchRecord {
    fn write_into<W: ByteWriter>(&self, target: &mut W) {
        self.tree_key.write_into(target);
        target.write_u64(self.left_leaf_index);
        self.leaves[0].write_into(target);
        self.leaves[1].write_into(target);
        write_flag(target, self.inserted);
    }
}

impl Deserializable for LeafBatchRecord {
    fn read_from<R: ByteReader>(source: &mut R) -> Result<Self, DeserializationError> {
        let tree_key = TreeKey::read_from(source)?;
        let left_leaf_index = source.read_u64()?;
        let leaves = [Digest::read_from(source)?, Digest::read_from(source)?];
        let inserted = read_flag(source)?;
        Ok(Self { tree_key, left_leaf_index, leaves, inserted })
    }
}

// TESTS
// ================================================================================================
