//! Update sessions: the exclusive record pinning a tree while a batch is hashed into it.

mod checkpoint;
mod lock;

pub use checkpoint::{BatchContext, Checkpoint};
pub use lock::{LockedRecord, Phase, SessionHandle, UpdateLock};

#[cfg(test)]
mod tests;

/// Returns the number of steps of `quantum` hash operations needed to insert `records` leaf pairs
/// into a tree of the given height.
pub fn steps_required(records: usize, height: u8, quantum: usize) -> u64 {
    steps_for_ops(ops_required(records, height), quantum)
}

/// Returns the number of hash operations needed to insert `records` leaf pairs into a tree of the
/// given height: one per level for every pair.
pub fn ops_required(records: usize, height: u8) -> u64 {
    records as u64 * height as u64
}

/// Returns the number of steps of `quantum` operations needed to perform `ops` operations.
///
/// A `quantum` of zero is treated as one.
pub(crate) fn steps_for_ops(ops: u64, quantum: usize) -> u64 {
    ops.div_ceil(quantum.max(1) as u64)
}
