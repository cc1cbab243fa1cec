use crate::contracts::error::IdFactoryError;

/// Issues unique, monotonically increasing string ids backed by a shared store.
///
/// # Invariants
/// - Every successful `next_id` returns a value greater than any earlier one,
///   across all factories sharing the same backing collection
/// - No value is issued twice and no value is skipped by a failed call
/// - `collection_uri` never changes once resolved
pub trait IdFactory: Send + Sync {
    /// Returns the next id.
    ///
    /// `Ok(None)` means the factory has not been initialized yet; nothing
    /// was sent to the store. `Err` means the store did not apply the update.
    fn next_id(&self) -> Result<Option<String>, IdFactoryError>;

    /// Returns `<base uri>/<collection name>`, or `None` before initialization.
    fn collection_uri(&self) -> Option<&str>;
}
