use std::sync::{PoisonError, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdFactoryError {
    /// Fatal at startup: bad configuration or the counter record could not be created.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The store did not apply the counter update. The caller may retry.
    #[error("Failed to update the id counter for collection: '{collection}': {source}")]
    Io {
        collection: String,
        #[source]
        source: StoreError,
    },
}

impl IdFactoryError {
    /// Returns true if the failed call can be retried by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IdFactoryError::Io { .. })
    }
}

/// Extension trait for converting lock errors to StoreError.
pub trait LockResultExt<T> {
    /// Converts a lock error to a StoreError.
    fn map_lock_err(self) -> Result<T, StoreError>;
}

impl<'a, T> LockResultExt<RwLockReadGuard<'a, T>>
    for Result<RwLockReadGuard<'a, T>, PoisonError<RwLockReadGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<RwLockReadGuard<'a, T>, StoreError> {
        self.map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl<'a, T> LockResultExt<RwLockWriteGuard<'a, T>>
    for Result<RwLockWriteGuard<'a, T>, PoisonError<RwLockWriteGuard<'a, T>>>
{
    #[inline]
    fn map_lock_err(self) -> Result<RwLockWriteGuard<'a, T>, StoreError> {
        self.map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("RocksDB error: {0}")]
    RocksDb(String),

    #[error("Write not acknowledged: {0}")]
    Unacknowledged(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Field '{field}' of document '{id}' overflowed")]
    Overflow { id: String, field: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Corrupt document: {0}")]
    Corrupt(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}
