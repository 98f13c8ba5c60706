use std::{path::PathBuf, sync::Arc, thread};

use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DB, DBCompactionStyle, DBCompressionType,
    FlushOptions, Options, WriteBatch, WriteOptions,
};
use winter_utils::{Deserializable, Serializable};

use super::{StorageError, StorageUpdateParts, StorageUpdates, TreeStorage};
use crate::{
    LeafBatchRecord, RecordKey, SessionId, TreeKey, TreeState, ids::ID_BYTES, session::UpdateLock,
};

/// The name of the RocksDB column family used for storing tree states.
const TREES_CF: &str = "trees";
/// The name of the RocksDB column family used for storing open update sessions.
const LOCKS_CF: &str = "locks";
/// The name of the RocksDB column family used for storing queued leaf records.
const RECORDS_CF: &str = "records";

/// Length of a record key: the tree key followed by the big-endian left leaf index.
const RECORD_KEY_LEN: usize = ID_BYTES + 8;

/// A RocksDB-backed persistent storage implementation for commitment trees.
///
/// Implements the [TreeStorage] trait using three column families:
/// - `TREES_CF` ("trees"): serialized `TreeState`, keyed by the 32-byte tree key.
/// - `LOCKS_CF` ("locks"): serialized `UpdateLock`, keyed by the 32-byte session id.
/// - `RECORDS_CF` ("records"): serialized `LeafBatchRecord`, keyed by the tree key followed by the
///   big-endian left leaf index, so the records of one tree are stored contiguously and in queue
///   order.
///
/// Every [StorageUpdates] batch becomes a single RocksDB `WriteBatch`.
#[derive(Debug, Clone)]
pub struct RocksDbStorage {
    db: Arc<DB>,
    sync_writes: bool,
}

impl RocksDbStorage {
    /// Opens or creates a RocksDB database at the configured path.
    ///
    /// # Errors
    /// Returns `StorageError::Backend` if the database cannot be opened or configured,
    /// for example, due to path issues, permissions, or RocksDB internal errors.
    pub fn open(config: RocksDbConfig) -> Result<Self, StorageError> {
        let parallelism = thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as i32;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.increase_parallelism(parallelism);
        db_opts.set_max_open_files(config.max_open_files);
        db_opts.set_max_background_jobs(parallelism);

        // Shared block cache across all column families
        let cache = Cache::new_lru_cache(config.cache_size);

        let mut table_opts = BlockBasedOptions::default();
        table_opts.set_block_cache(&cache);
        table_opts.set_bloom_filter(10.0, false);
        // Point lookups only
        table_opts.set_whole_key_filtering(true);
        table_opts.set_pin_l0_filter_and_index_blocks_in_cache(true);

        // Records are the bulk of the data and are written once, updated once
        let mut records_opts = Options::default();
        records_opts.set_block_based_table_factory(&table_opts);
        // 64 MB memtable
        records_opts.set_write_buffer_size(64 << 20);
        records_opts.set_max_write_buffer_number(3);
        records_opts.set_compaction_style(DBCompactionStyle::Level);
        records_opts.set_compression_type(DBCompressionType::Lz4);

        // Trees and sessions are few and rewritten on every step
        let mut small_opts = Options::default();
        small_opts.set_block_based_table_factory(&table_opts);
        small_opts.set_compression_type(DBCompressionType::None);

        let cfs = vec![
            ColumnFamilyDescriptor::new(TREES_CF, small_opts.clone()),
            ColumnFamilyDescriptor::new(LOCKS_CF, small_opts),
            ColumnFamilyDescriptor::new(RECORDS_CF, records_opts),
        ];

        let db = DB::open_cf_descriptors(&db_opts, config.path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            sync_writes: config.sync_writes,
        })
    }

    /// Flushes all column families and the write-ahead log to disk.
    ///
    /// # Errors
    /// - Returns `StorageError::Backend` if the flush operation fails.
    pub fn sync(&self) -> Result<(), StorageError> {
        let mut fopts = FlushOptions::default();
        fopts.set_wait(true);

        for name in [TREES_CF, LOCKS_CF, RECORDS_CF] {
            let cf = self.cf_handle(name)?;
            self.db.flush_cf_opt(cf, &fopts)?;
        }

        self.db.flush_wal(true)?;
        Ok(())
    }

    /// Converts a record key into its fixed-size RocksDB key.
    #[inline(always)]
    fn record_db_key(key: &RecordKey) -> [u8; RECORD_KEY_LEN] {
        let mut bytes = [0u8; RECORD_KEY_LEN];
        bytes[..ID_BYTES].copy_from_slice(key.tree_key.as_bytes());
        bytes[ID_BYTES..].copy_from_slice(&key.left_leaf_index.to_be_bytes());
        bytes
    }

    /// Retrieves a handle to a RocksDB column family by its name.
    ///
    /// # Errors
    /// Returns `StorageError::Unsupported` if the column family with the given `name` does not
    /// exist.
    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::Unsupported(format!("unknown column family `{name}`")))
    }

    fn decode_record(key: &RecordKey, bytes: &[u8]) -> Result<LeafBatchRecord, StorageError> {
        let record = LeafBatchRecord::read_from_bytes(bytes)?;
        if record.key() != *key {
            return Err(StorageError::KeyMismatch { what: "leaf batch record" });
        }
        Ok(record)
    }
}

impl TreeStorage for RocksDbStorage {
    /// Retrieves a tree state from the `TREES_CF` column family.
    ///
    /// # Errors
    /// - `StorageError::Backend`: If the column family is missing or a RocksDB error occurs.
    /// - `StorageError::Value`: If the stored bytes are corrupt.
    fn get_tree(&self, key: &TreeKey) -> Result<Option<TreeState>, StorageError> {
        let cf = self.cf_handle(TREES_CF)?;
        let Some(bytes) = self.db.get_cf(cf, key.as_bytes())? else {
            return Ok(None);
        };
        let tree = TreeState::read_from_bytes(&bytes)?;
        if tree.key() != *key {
            return Err(StorageError::KeyMismatch { what: "tree state" });
        }
        Ok(Some(tree))
    }

    fn get_lock(&self, session: &SessionId) -> Result<Option<UpdateLock>, StorageError> {
        let cf = self.cf_handle(LOCKS_CF)?;
        let Some(bytes) = self.db.get_cf(cf, session.as_bytes())? else {
            return Ok(None);
        };
        let lock = UpdateLock::read_from_bytes(&bytes)?;
        if lock.session() != *session {
            return Err(StorageError::KeyMismatch { what: "update session" });
        }
        Ok(Some(lock))
    }

    fn get_record(&self, key: &RecordKey) -> Result<Option<LeafBatchRecord>, StorageError> {
        let cf = self.cf_handle(RECORDS_CF)?;
        match self.db.get_cf(cf, Self::record_db_key(key))? {
            Some(bytes) => Ok(Some(Self::decode_record(key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Retrieves multiple records with a single RocksDB `multi_get_cf` call.
    fn get_records(
        &self,
        keys: &[RecordKey],
    ) -> Result<Vec<Option<LeafBatchRecord>>, StorageError> {
        let cf = self.cf_handle(RECORDS_CF)?;
        let db_keys = keys.iter().map(|key| (cf, Self::record_db_key(key)));

        self.db
            .multi_get_cf(db_keys)
            .into_iter()
            .zip(keys)
            .map(|(result, key)| -> Result<_, StorageError> {
                match result? {
                    Some(bytes) => Ok(Some(Self::decode_record(key, &bytes)?)),
                    None => Ok(None),
                }
            })
            .collect()
    }

    /// Applies a batch of `StorageUpdates` atomically to the RocksDB backend.
    ///
    /// Tree writes go to `TREES_CF`, session writes and deletions to `LOCKS_CF` and record writes
    /// to `RECORDS_CF`, all in one `WriteBatch`.
    ///
    /// # Errors
    /// - `StorageError::Backend`: If any column family is missing or a RocksDB write error occurs.
    fn apply(&self, updates: StorageUpdates) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();

        let trees_cf = self.cf_handle(TREES_CF)?;
        let locks_cf = self.cf_handle(LOCKS_CF)?;
        let records_cf = self.cf_handle(RECORDS_CF)?;

        let StorageUpdateParts { tree_updates, lock_updates, record_updates } =
            updates.into_parts();

        for (key, tree) in tree_updates {
            batch.put_cf(trees_cf, key.as_bytes(), tree.to_bytes());
        }

        for (session, maybe_lock) in lock_updates {
            match maybe_lock {
                Some(lock) => batch.put_cf(locks_cf, session.as_bytes(), lock.to_bytes()),
                None => batch.delete_cf(locks_cf, session.as_bytes()),
            }
        }

        for (key, record) in record_updates {
            batch.put_cf(records_cf, Self::record_db_key(&key), record.to_bytes());
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &write_opts)?;

        Ok(())
    }
}

/// Flushes RocksDB before dropping the last handle to the database.
///
/// # Panics
/// - If the RocksDB sync operation fails.
impl Drop for RocksDbStorage {
    fn drop(&mut self) {
        if Arc::strong_count(&self.db) > 1 {
            return;
        }
        if let Err(e) = self.sync() {
            panic!("failed to flush RocksDB on drop: {e}");
        }
    }
}

// CONFIG
// --------------------------------------------------------------------------------------------

/// Parameters needed to open a [RocksDbStorage].
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// The filesystem path where the RocksDB database will be stored.
    pub(crate) path: PathBuf,

    /// The size of the RocksDB block cache in bytes. Default: 64 MB.
    pub(crate) cache_size: usize,

    /// The maximum number of files that RocksDB can have open simultaneously. Default: 256.
    pub(crate) max_open_files: i32,

    /// Whether every step is synced to disk before it is acknowledged. Default: `true`.
    pub(crate) sync_writes: bool,
}

impl RocksDbConfig {
    /// Creates a new RocksDbConfig with the given database path and default settings.
    ///
    /// # Examples
    /// ```
    /// use commitment_tree::storage::RocksDbConfig;
    ///
    /// let config = RocksDbConfig::new("/path/to/database");
    /// ```
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            cache_size: 64 << 20,
            max_open_files: 256,
            sync_writes: true,
        }
    }

    /// Sets the block cache size for RocksDB, in bytes.
    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    /// Sets the maximum number of files that RocksDB can have open simultaneously.
    pub fn with_max_open_files(mut self, count: i32) -> Self {
        self.max_open_files = count;
        self
    }

    /// Sets whether each applied step waits for the write-ahead log to reach the disk.
    ///
    /// Turning this off trades durability of the most recent steps for throughput; a crash may
    /// then roll a session back to an earlier checkpoint, which the coordinator simply redoes.
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::Backend(Box::new(e))
    }
}
