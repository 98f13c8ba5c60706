use crate::CoordinatorId;

// CONSTANTS
// ================================================================================================

/// Default number of hash operations performed by one `advance` step.
pub const DEFAULT_HASHES_PER_STEP: usize = 8;

/// Default maximum number of leaf pair records in one session.
pub const DEFAULT_MAX_BATCH_RECORDS: usize = 16;

/// Default time, in seconds, after which an abandoned session may be reclaimed.
pub const DEFAULT_LOCK_DURATION: u64 = 120;

// UPDATER CONFIG
// ================================================================================================

/// Policy parameters of a [`TreeUpdater`](crate::TreeUpdater).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct UpdaterConfig {
    /// The work quantum: hash operations performed by one `advance` step.
    pub(crate) hashes_per_step: usize,

    /// Maximum number of records a session may carry.
    pub(crate) max_batch_records: usize,

    /// Seconds a session holds its tree before the authority may reclaim it.
    pub(crate) lock_duration: u64,

    /// The only caller allowed to force-release sessions.
    pub(crate) authority: CoordinatorId,
}

impl UpdaterConfig {
    /// Creates a config with default limits and the given reclaim authority.
    pub fn new(authority: CoordinatorId) -> Self {
        Self {
            hashes_per_step: DEFAULT_HASHES_PER_STEP,
            max_batch_records: DEFAULT_MAX_BATCH_RECORDS,
            lock_duration: DEFAULT_LOCK_DURATION,
            authority,
        }
    }

    /// Sets the number of hash operations performed by one step. Zero is treated as one.
    pub fn with_hashes_per_step(mut self, hashes: usize) -> Self {
        self.hashes_per_step = hashes;
        self
    }

    /// Sets the maximum number of records per session.
    pub fn with_max_batch_records(mut self, records: usize) -> Self {
        self.max_batch_records = records;
        self
    }

    /// Sets the lease, in seconds, after which a session may be force-released.
    pub fn with_lock_duration(mut self, seconds: u64) -> Self {
        self.lock_duration = seconds;
        self
    }

    pub fn hashes_per_step(&self) -> usize {
        self.hashes_per_step.max(1)
    }

    pub fn max_batch_records(&self) -> usize {
        self.max_batch_records
    }

    pub fn lock_duration(&self) -> u64 {
        self.lock_duration
    }

    pub fn authority(&self) -> CoordinatorId {
        self.authority
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self::new(CoordinatorId::default())
    }
}
