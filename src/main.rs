use std::{path::PathBuf, time::Instant};

use clap::{Parser, ValueEnum};
#[cfg(feature = "rocksdb")]
use commitment_tree::storage::{RocksDbConfig, RocksDbStorage};
use commitment_tree::{
    CoordinatorId, DEFAULT_HASHES_PER_STEP, Digest, HashFunction, RecordKey, TreeKey, TreeParams,
    TreeUpdateError, TreeUpdater, UpdaterConfig,
    storage::{MemoryStorage, TreeStorage},
};
use rand::{Rng, thread_rng};
use tracing_subscriber::EnvFilter;

type Storage = Box<dyn TreeStorage>;

#[derive(Parser, Debug)]
#[command(
    name = "commitment-tree",
    about = "Drives checkpointed batch insertions into a commitment tree",
    version,
    rename_all = "kebab-case"
)]
pub struct UpdateCmd {
    /// Height of the tree
    #[arg(long = "height", default_value = "20")]
    height: u8,
    /// Hash function used for interior nodes
    #[arg(long = "hash", value_enum, default_value = "blake3")]
    hash: HashFunction,
    /// Number of sessions to run
    #[arg(short = 'b', long = "batches", default_value = "16")]
    batches: usize,
    /// Number of leaf pairs committed by each session
    #[arg(short = 'r', long = "records", default_value = "16")]
    records: usize,
    /// Number of hash operations performed by each advance call
    #[arg(short = 'q', long = "hashes-per-step", default_value_t = DEFAULT_HASHES_PER_STEP)]
    hashes_per_step: usize,
    /// Path for the database
    #[arg(short = 'p', long = "path")]
    storage_path: Option<PathBuf>,
    /// Storage backend to use at runtime: memory or rocksdb
    #[arg(short = 's', long = "storage", value_enum, default_value = "memory")]
    storage: StorageKind,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StorageKind {
    Memory,
    Rocksdb,
}

fn main() -> Result<(), TreeUpdateError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = UpdateCmd::parse();
    run(args)?;
    println!("Run completed successfully");
    Ok(())
}

/// Creates a tree and inserts `batches` batches of random leaves through the session protocol.
fn run(args: UpdateCmd) -> Result<(), TreeUpdateError> {
    let coordinator = CoordinatorId::from_seed(b"commitment-tree/coordinator");
    let config = UpdaterConfig::new(coordinator)
        .with_hashes_per_step(args.hashes_per_step)
        .with_max_batch_records(args.records);
    let updater = TreeUpdater::new(get_storage(args.storage_path, args.storage)?, config);

    let tree_key = TreeKey::new(thread_rng().gen());
    let params = TreeParams::default().with_height(args.height).with_hash_function(args.hash);
    updater.create_tree(tree_key, params)?;
    println!(
        "Created a tree of height {} hashed with {} under key {tree_key}",
        args.height, args.hash
    );

    let mut advance_calls = 0;
    let now = Instant::now();
    for _ in 0..args.batches {
        let batch = enqueue_batch(&updater, tree_key, args.records)?;
        advance_calls += insert_batch(&updater, tree_key, coordinator, &batch)?;
    }
    let elapsed = now.elapsed().as_secs_f32();

    let (root, slot) = updater.current_root(tree_key)?;
    println!(
        "Inserted {} leaves in {elapsed:.3} seconds using {advance_calls} advance calls",
        updater.next_index(tree_key)?,
    );
    println!("Current root {root} in history slot {slot}");
    Ok(())
}

/// Queues `records` random leaf pairs.
fn enqueue_batch(
    updater: &TreeUpdater<Storage>,
    tree_key: TreeKey,
    records: usize,
) -> Result<Vec<RecordKey>, TreeUpdateError> {
    let mut rng = thread_rng();
    (0..records)
        .map(|_| {
            let leaves = [Digest::new(rng.gen()), Digest::new(rng.gen())];
            Ok(updater.enqueue(tree_key, leaves)?.key())
        })
        .collect()
}

/// Runs one session over `batch` and returns the number of advance calls it took.
fn insert_batch(
    updater: &TreeUpdater<Storage>,
    tree_key: TreeKey,
    coordinator: CoordinatorId,
    batch: &[RecordKey],
) -> Result<usize, TreeUpdateError> {
    let now = Instant::now();
    let handle = updater.open_session(tree_key, coordinator, batch)?;
    let planned = updater.steps_required(&handle)?;

    let mut calls = 0;
    while updater.session(&handle)?.root().is_none() {
        updater.advance(&handle, coordinator)?;
        calls += 1;
    }
    let slot = updater.commit(&handle, coordinator)?;

    let elapsed = now.elapsed().as_micros();
    println!(
        "Committed {} records with {calls}/{planned} advance calls \
         into slot {slot} in {elapsed} μs",
        batch.len()
    );
    Ok(calls)
}

fn get_storage(
    database_path: Option<PathBuf>,
    kind: StorageKind,
) -> Result<Storage, TreeUpdateError> {
    match kind {
        StorageKind::Memory => Ok(Box::new(MemoryStorage::new())),
        StorageKind::Rocksdb => {
            #[cfg(feature = "rocksdb")]
            {
                let path = database_path
                    .unwrap_or_else(|| std::env::temp_dir().join("commitment_tree_run"));
                println!("Using database path: {}", path.display());
                let db = RocksDbStorage::open(RocksDbConfig::new(path))?;
                Ok(Box::new(db))
            }
            #[cfg(not(feature = "rocksdb"))]
            {
                let _ = database_path;
                eprintln!("rocksdb feature not enabled; falling back to memory storage");
                Ok(Box::new(MemoryStorage::new()))
            }
        },
    }
}
