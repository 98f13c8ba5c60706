use assert_matches::assert_matches;
use commitment_tree::{
    CoordinatorId, Digest, HashFunction, Phase, TreeKey, TreeParams, TreeUpdateError, TreeUpdater,
    UpdaterConfig, storage::MemoryStorage, tree::EmptySubtreeRoots,
};

fn coordinator() -> CoordinatorId {
    CoordinatorId::from_seed(b"coordinator")
}

fn leaf(byte: u8) -> Digest {
    Digest::new([byte; 32])
}

fn updater(hashes_per_step: usize) -> TreeUpdater<MemoryStorage> {
    let config = UpdaterConfig::new(CoordinatorId::from_seed(b"authority"))
        .with_hashes_per_step(hashes_per_step);
    TreeUpdater::new(MemoryStorage::new(), config)
}

#[test]
fn two_records_into_a_height_four_tree() {
    let updater = updater(1);
    let tree_key = TreeKey::from_seed(b"A");
    updater.create_tree(tree_key, TreeParams::default().with_height(4)).unwrap();
    assert_eq!(updater.next_index(tree_key).unwrap(), 0);

    let first = updater.enqueue(tree_key, [leaf(1), leaf(2)]).unwrap();
    let second = updater.enqueue(tree_key, [leaf(3), leaf(4)]).unwrap();
    assert_eq!(first.left_leaf_index(), 0);
    assert_eq!(second.left_leaf_index(), 2);
    let batch = [first.key(), second.key()];

    let handle = updater.open_session(tree_key, coordinator(), &batch).unwrap();
    assert_eq!(updater.session(&handle).unwrap().phase(), Phase::Hashing);
    assert_eq!(updater.steps_required(&handle).unwrap(), 8);

    let phases: Vec<Phase> =
        (0..10).map(|_| updater.advance(&handle, coordinator()).unwrap()).collect();
    assert!(phases[..7].iter().all(|phase| *phase == Phase::Hashing));
    assert!(phases[7..].iter().all(|phase| *phase == Phase::ReadyToCommit));

    let (empty_root, _) = updater.current_root(tree_key).unwrap();
    assert_eq!(updater.commit_root(&handle, tree_key, coordinator()).unwrap(), 1);

    let tree = updater.tree(tree_key).unwrap();
    assert_eq!(tree.next_index(), 4);
    assert_eq!(tree.roots().len(), 2);
    assert!(updater.is_known_root(tree_key, &empty_root).unwrap());
    assert!(updater.record(first.key()).unwrap().is_inserted());
    assert!(updater.record(second.key()).unwrap().is_inserted());

    // root of the four leaves padded with empty subtrees
    let hash = HashFunction::Blake3;
    let zeros = EmptySubtreeRoots::compute(hash, 4);
    let left = hash.merge(hash.merge(leaf(1), leaf(2)), hash.merge(leaf(3), leaf(4)));
    let expected = hash.merge(hash.merge(left, zeros[2]), zeros[3]);
    assert_eq!(tree.current_root().0, expected);

    assert_matches!(
        updater.open_session(tree_key, coordinator(), &batch),
        Err(TreeUpdateError::OutOfOrderBatch { expected: 4, found: 0 })
    );
}

#[test]
fn records_of_another_tree_are_rejected() {
    let updater = updater(4);
    let tree_a = TreeKey::from_seed(b"A");
    let tree_b = TreeKey::from_seed(b"B");
    updater.create_tree(tree_a, TreeParams::default().with_height(4)).unwrap();
    updater.create_tree(tree_b, TreeParams::default().with_height(4)).unwrap();

    let foreign = updater.enqueue(tree_b, [leaf(1), leaf(2)]).unwrap();
    assert_matches!(
        updater.open_session(tree_a, coordinator(), &[foreign.key()]),
        Err(TreeUpdateError::WrongTree { expected, found }) if expected == tree_a && found == tree_b
    );

    assert_eq!(updater.tree(tree_a).unwrap().lock(), None);
    assert_eq!(updater.storage().lock_count().unwrap(), 0);
}

#[test]
fn keccak_trees_commit_keccak_roots() {
    let updater = updater(3);
    let tree_key = TreeKey::from_seed(b"K");
    let params = TreeParams::default().with_height(2).with_hash_function(HashFunction::Keccak256);
    updater.create_tree(tree_key, params).unwrap();

    let record = updater.enqueue(tree_key, [leaf(7), leaf(8)]).unwrap();
    let handle = updater.open_session(tree_key, coordinator(), &[record.key()]).unwrap();
    assert_eq!(updater.advance(&handle, coordinator()).unwrap(), Phase::ReadyToCommit);
    updater.commit(&handle, coordinator()).unwrap();

    let hash = HashFunction::Keccak256;
    let zeros = EmptySubtreeRoots::compute(hash, 2);
    let expected = hash.merge(hash.merge(leaf(7), leaf(8)), zeros[1]);
    assert_eq!(updater.current_root(tree_key).unwrap(), (expected, 1));
}
