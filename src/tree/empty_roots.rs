use crate::{Digest, HashFunction};

// EMPTY SUBTREE ROOTS
// ================================================================================================

/// Roots of empty subtrees of every height.
///
/// The empty leaf is the all-zero digest, and the empty subtree of height `l + 1` is the merge of
/// two empty subtrees of height `l`.
pub struct EmptySubtreeRoots;

impl EmptySubtreeRoots {
    /// Returns the empty subtree roots for heights `0..=height`, i.e. `height + 1` digests where
    /// entry `l` is the value of an empty node at level `l` counted from the leaves.
    pub fn compute(hash_function: HashFunction, height: u8) -> Vec<Digest> {
        let mut zeros = Vec::with_capacity(height as usize + 1);
        let mut current = Digest::default();
        zeros.push(current);
        for _ in 0..height {
            current = hash_function.merge(current, current);
            zeros.push(current);
        }
        zeros
    }

    /// Returns the root of an empty tree of the given height.
    pub fn root(hash_function: HashFunction, height: u8) -> Digest {
        let zeros = Self::compute(hash_function, height);
        zeros[height as usize]
    }
}
