use std::sync::PoisonError;

/// Errors returned by any [`TreeStorage`](super::TreeStorage) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Backend I/O or database error (e.g., RocksDB).
    #[error("backend error: {0}")]
    Backend(#[from] Box<dyn core::error::Error + Send + Sync + 'static>),
    /// A stored value was filed under a key it does not carry.
    #[error("stored {what} does not match the key it was read from")]
    KeyMismatch { what: &'static str },
    /// The requested operation is not supported by this backend.
    #[error("operation not supported: {0}")]
    Unsupported(String),
    /// A stored value failed to decode from bytes.
    #[error("failed to decode value bytes")]
    Value(#[from] winter_utils::DeserializationError),
}

impl<T> From<PoisonError<T>> for StorageError {
    fn from(e: PoisonError<T>) -> Self {
        // the guard inside the error may not be `Send`, so only its message is kept
        #[derive(Debug)]
        struct LockError(String);

        impl core::fmt::Display for LockError {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl core::error::Error for LockError {}

        StorageError::Backend(Box::new(LockError(format!("lock poisoned: {e}"))))
    }
}
