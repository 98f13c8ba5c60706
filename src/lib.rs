//! Checkpointed batch insertion into append-only commitment trees.
//!
//! A commitment tree is a fixed-height binary hash tree whose leaves are only ever appended.
//! Inserting a batch of leaves is split into many small, resumable steps: a coordinator opens an
//! exclusive session on a tree, advances it step by step until the new root is known, and then
//! commits it. See [TreeUpdater] for the protocol.

pub mod clock;
pub mod hash;
pub mod session;
pub mod storage;
pub mod tree;
pub mod utils;

mod config;
mod digest;
mod errors;
mod ids;
mod queue;
mod updater;

// RE-EXPORTS
// ================================================================================================

pub use config::{
    DEFAULT_HASHES_PER_STEP, DEFAULT_LOCK_DURATION, DEFAULT_MAX_BATCH_RECORDS, UpdaterConfig,
};
pub use digest::{DIGEST_BYTES, Digest};
pub use errors::TreeUpdateError;
pub use hash::HashFunction;
pub use ids::{CoordinatorId, ID_BYTES, SessionId, TreeKey};
pub use queue::{LeafBatchRecord, RecordKey};
pub use session::{Phase, SessionHandle, UpdateLock};
pub use tree::{MAX_TREE_HEIGHT, TreeParams, TreeState};
pub use updater::TreeUpdater;

// TYPE ALIASES
// ================================================================================================

/// An alias for a key-value map.
///
/// Ordered so that storage batches are applied in a deterministic order.
pub type Map<K, V> = std::collections::BTreeMap<K, V>;

/// An alias for a simple set.
pub type Set<V> = std::collections::BTreeSet<V>;

// TESTS
// ================================================================================================

#[test]
#[should_panic]
fn debug_assert_is_checked() {
    // enforce the release checks to always have `RUSTFLAGS="-C debug-assertions"`.
    //
    // the frontier consistency check on commit is a `debug_assert`, and we want it exercised.
    debug_assert!(false);
}

#[test]
#[should_panic]
#[allow(arithmetic_overflow)]
fn overflow_panics_for_test() {
    // overflows might be disabled if tests are performed in release mode. leaf index arithmetic
    // relies on them being caught in tests.
    let a = 1_u64;
    let b = 64;
    assert_ne!(a << b, 0);
}
