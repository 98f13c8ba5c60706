use assert_matches::assert_matches;
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::*;
use crate::{
    CoordinatorId, Digest, HashFunction, RecordKey, TreeKey, TreeParams, TreeState,
    tree::EmptySubtreeRoots,
    utils::{Deserializable, DeserializationError, Serializable},
};

// HELPERS
// ================================================================================================

fn random_pairs(rng: &mut ChaCha20Rng, count: usize) -> Vec<[Digest; 2]> {
    (0..count).map(|_| [Digest::new(rng.gen()), Digest::new(rng.gen())]).collect()
}

/// Computes the root of a tree of `height` holding `leaves` followed by empty leaves.
fn naive_root(hash_function: HashFunction, height: u8, leaves: &[Digest]) -> Digest {
    let zeros = EmptySubtreeRoots::compute(hash_function, height);
    let mut layer = leaves.to_vec();
    for level in 0..height as usize {
        if layer.is_empty() {
            return zeros[height as usize];
        }
        if layer.len() % 2 == 1 {
            layer.push(zeros[level]);
        }
        layer = layer.chunks(2).map(|pair| hash_function.merge(pair[0], pair[1])).collect();
    }
    layer[0]
}

fn open_lock(tree: &TreeState, pairs: &[[Digest; 2]]) -> UpdateLock {
    let batch = pairs
        .iter()
        .enumerate()
        .map(|(i, leaves)| LockedRecord {
            key: RecordKey::new(tree.key(), tree.next_index() + 2 * i as u64),
            leaves: *leaves,
        })
        .collect();
    UpdateLock::open(tree, CoordinatorId::from_seed(b"coordinator"), batch, 0)
}

/// Drives `lock` to completion, taking quanta from `slices` in a cycle.
fn run_sliced(lock: &mut UpdateLock, slices: &[usize]) -> usize {
    let mut steps = 0;
    for quantum in slices.iter().cycle() {
        steps += 1;
        if lock.advance(*quantum) == Phase::ReadyToCommit {
            break;
        }
    }
    steps
}

// STEP ARITHMETIC
// ================================================================================================

#[test]
fn steps_round_up() {
    assert_eq!(ops_required(2, 4), 8);
    assert_eq!(steps_required(2, 4, 1), 8);
    assert_eq!(steps_required(2, 4, 3), 3);
    assert_eq!(steps_required(2, 4, 8), 1);
    assert_eq!(steps_required(2, 4, usize::MAX), 1);
    assert_eq!(steps_required(16, 22, 8), 44);
    assert_eq!(steps_required(1, 4, 0), 4);
}

// CHECKPOINT
// ================================================================================================

#[test]
fn single_pair_in_height_one_tree_is_one_operation() {
    let tree = TreeState::new(TreeKey::from_seed(b"tree"), TreeParams::default().with_height(1))
        .unwrap();
    let leaves = [Digest::new([1; 32]), Digest::new([2; 32])];
    let mut lock = open_lock(&tree, &[leaves]);

    assert_eq!(lock.checkpoint().total_ops(), 1);
    assert_eq!(lock.advance(1), Phase::ReadyToCommit);
    assert_eq!(lock.root(), Some(HashFunction::Blake3.merge(leaves[0], leaves[1])));
    assert_eq!(lock.checkpoint().frontier(), &[leaves[0]]);
}

#[test]
fn checkpoint_counts_operations() {
    let tree = TreeState::new(TreeKey::from_seed(b"tree"), TreeParams::default().with_height(4))
        .unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let mut lock = open_lock(&tree, &random_pairs(&mut rng, 2));

    assert_eq!(lock.steps_remaining(3), 3);
    assert_eq!(lock.advance(3), Phase::Hashing);
    assert_eq!(lock.checkpoint().ops_done(), 3);
    assert_eq!(lock.checkpoint().remaining_ops(), 5);
    assert_eq!(lock.root(), None);

    assert_eq!(lock.advance(100), Phase::ReadyToCommit);
    assert_eq!(lock.checkpoint().ops_done(), 8);
    assert_eq!(lock.steps_remaining(3), 0);
}

#[test]
fn completed_sessions_ignore_further_steps() {
    let tree = TreeState::new(TreeKey::from_seed(b"tree"), TreeParams::default().with_height(3))
        .unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(2);
    let mut lock = open_lock(&tree, &random_pairs(&mut rng, 1));

    assert_eq!(lock.advance(usize::MAX), Phase::ReadyToCommit);
    let snapshot = lock.to_bytes();
    assert_eq!(lock.advance(5), Phase::ReadyToCommit);
    assert_eq!(lock.to_bytes(), snapshot);
}

#[test]
fn zero_quantum_still_makes_progress() {
    let tree = TreeState::new(TreeKey::from_seed(b"tree"), TreeParams::default().with_height(2))
        .unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let mut lock = open_lock(&tree, &random_pairs(&mut rng, 1));

    lock.advance(0);
    assert_eq!(lock.checkpoint().ops_done(), 1);
}

#[test]
fn sessions_resume_from_serialized_state() {
    let tree = TreeState::new(
        TreeKey::from_seed(b"tree"),
        TreeParams::default().with_height(5).with_hash_function(HashFunction::Keccak256),
    )
    .unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(4);
    let pairs = random_pairs(&mut rng, 3);

    let mut uninterrupted = open_lock(&tree, &pairs);
    uninterrupted.advance(usize::MAX);

    let mut resumed = open_lock(&tree, &pairs);
    while resumed.phase() == Phase::Hashing {
        resumed.advance(2);
        resumed = UpdateLock::read_from_bytes(&resumed.to_bytes()).unwrap();
    }
    assert_eq!(resumed, uninterrupted);
}

#[test]
fn corrupted_session_bytes_are_rejected() {
    let tree = TreeState::new(TreeKey::from_seed(b"tree"), TreeParams::default().with_height(4))
        .unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(5);
    let mut lock = open_lock(&tree, &random_pairs(&mut rng, 2));
    lock.advance(usize::MAX);

    // flip the trailing phase byte back to `Hashing` although the checkpoint is complete
    let mut bytes = lock.to_bytes();
    let phase = bytes.len() - 9;
    bytes[phase] = 0;
    assert!(UpdateLock::read_from_bytes(&bytes).is_err());
}

#[test]
fn session_cursor_outside_the_batch_is_rejected() {
    let tree = TreeState::new(TreeKey::from_seed(b"tree"), TreeParams::default().with_height(4))
        .unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(6);
    let mut lock = open_lock(&tree, &random_pairs(&mut rng, 2));
    lock.advance(5);
    assert_eq!(lock.checkpoint().ops_done(), 5);

    let bytes = lock.to_bytes();
    assert_eq!(UpdateLock::read_from_bytes(&bytes).unwrap(), lock);

    // the checkpoint starts with the pair cursor, followed by level and node index
    let pair_at = bytes.len() - 9 - lock.checkpoint().to_bytes().len();
    let level_at = pair_at + 4;
    let node_at = level_at + 1;
    let ops_at = bytes.len() - 9 - 1 - 8 - 8;

    // cursor past the end of the batch
    let mut corrupted = bytes.clone();
    corrupted[pair_at..pair_at + 4].copy_from_slice(&5u32.to_le_bytes());
    assert_matches!(
        UpdateLock::read_from_bytes(&corrupted),
        Err(DeserializationError::InvalidValue(_))
    );

    // cursor past the end of the batch with a matching operation count
    corrupted[ops_at..ops_at + 8].copy_from_slice(&8u64.to_le_bytes());
    corrupted[pair_at..pair_at + 4].copy_from_slice(&2u32.to_le_bytes());
    corrupted[level_at] = 0;
    assert_matches!(
        UpdateLock::read_from_bytes(&corrupted),
        Err(DeserializationError::InvalidValue(_))
    );

    // operation count disagreeing with the cursor
    let mut corrupted = bytes.clone();
    corrupted[ops_at..ops_at + 8].copy_from_slice(&3u64.to_le_bytes());
    assert_matches!(
        UpdateLock::read_from_bytes(&corrupted),
        Err(DeserializationError::InvalidValue(_))
    );

    // running node at the wrong position of its level
    let mut corrupted = bytes;
    corrupted[node_at] ^= 1;
    assert_matches!(
        UpdateLock::read_from_bytes(&corrupted),
        Err(DeserializationError::InvalidValue(_))
    );
}

// DETERMINISM
// ================================================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn slicing_never_changes_the_result(
        seed in any::<u64>(),
        height in 4u8..=8,
        prefix_pairs in 0usize..4,
        batch_pairs in 1usize..=4,
        slices in prop::collection::vec(1usize..7, 1..6),
        keccak in any::<bool>(),
    ) {
        let hash_function = if keccak { HashFunction::Keccak256 } else { HashFunction::Blake3 };
        let params = TreeParams::default().with_height(height).with_hash_function(hash_function);
        let mut tree = TreeState::new(TreeKey::from_seed(b"tree"), params).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let mut leaves: Vec<Digest> = Vec::new();

        // commit an unaligned prefix first so the batch starts mid-tree
        if prefix_pairs > 0 {
            let prefix = random_pairs(&mut rng, prefix_pairs);
            let mut lock = open_lock(&tree, &prefix);
            lock.advance(usize::MAX);
            let (root, frontier) = lock.into_commit_parts().unwrap();
            tree.apply_commit(root, frontier, 2 * prefix_pairs as u64);
            leaves.extend(prefix.iter().flatten().copied());
        }

        let pairs = random_pairs(&mut rng, batch_pairs);
        leaves.extend(pairs.iter().flatten().copied());

        let mut one_shot = open_lock(&tree, &pairs);
        prop_assert_eq!(one_shot.advance(usize::MAX), Phase::ReadyToCommit);

        let mut sliced = open_lock(&tree, &pairs);
        let steps = run_sliced(&mut sliced, &slices);
        let min_slice = *slices.iter().min().unwrap() as u64;
        prop_assert!(steps as u64 <= ops_required(batch_pairs, height).div_ceil(min_slice));

        prop_assert_eq!(sliced.root(), one_shot.root());
        prop_assert_eq!(sliced.checkpoint().frontier(), one_shot.checkpoint().frontier());
        prop_assert_eq!(one_shot.root(), Some(naive_root(hash_function, height, &leaves)));

        // the committed frontier reproduces the new root
        let (root, frontier) = sliced.into_commit_parts().unwrap();
        tree.apply_commit(root, frontier, 2 * batch_pairs as u64);
        if let Some(frontier_root) = tree.frontier_root() {
            prop_assert_eq!(frontier_root, root);
        }
    }
}
