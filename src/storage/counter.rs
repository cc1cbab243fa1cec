//! The counter record and the two store operations that touch it.

use crate::contracts::{Collection, Document, IdFactoryError, StoreError, UpsertOutcome};

/// Fixed id of the counter record in every backing collection.
pub const SENTINEL_ID: &str = "0";
/// Field holding the last issued value.
pub const LAST_ID_FIELD: &str = "lastId";

/// The counter record as first written: `{id: "0", lastId: 0}`.
pub fn initial_counter() -> Document {
    Document::new(SENTINEL_ID).with_field(LAST_ID_FIELD, 0)
}

/// Makes sure the collection holds exactly one counter record.
///
/// This is a single insert-if-absent, so any number of factories may
/// initialize the same empty collection concurrently and only one record
/// is ever created. An existing counter is left untouched.
pub fn ensure_counter(collection: &dyn Collection) -> Result<UpsertOutcome, IdFactoryError> {
    let outcome = collection
        .upsert_if_absent(&initial_counter())
        .map_err(|e| {
            tracing::warn!(
                collection = %collection.name(),
                error = %e,
                "Failed to create id counter"
            );
            IdFactoryError::Configuration(format!(
                "Could not initialize the id counter for collection: '{}': {}",
                collection.name(),
                e
            ))
        })?;

    match outcome {
        UpsertOutcome::Inserted => {
            tracing::debug!(collection = %collection.name(), "Created id counter")
        }
        UpsertOutcome::AlreadyPresent => {
            tracing::debug!(collection = %collection.name(), "Using existing id counter")
        }
    }

    Ok(outcome)
}

/// Atomically bumps `lastId` by one and returns the post-increment value.
///
/// The value comes from the document the store returns, never from a
/// separate read, so concurrent callers can't observe the same value.
pub fn increment_counter(collection: &dyn Collection) -> Result<u64, IdFactoryError> {
    let document = collection
        .increment_and_fetch(SENTINEL_ID, LAST_ID_FIELD, 1)
        .map_err(|e| io_error(collection, e))?
        .ok_or_else(|| {
            io_error(
                collection,
                StoreError::NotFound(format!("counter record '{}'", SENTINEL_ID)),
            )
        })?;

    let value = document.get(LAST_ID_FIELD).ok_or_else(|| {
        io_error(
            collection,
            StoreError::Corrupt(format!("counter record has no '{}' field", LAST_ID_FIELD)),
        )
    })?;

    u64::try_from(value).map_err(|_| {
        io_error(
            collection,
            StoreError::Corrupt(format!("negative counter value {}", value)),
        )
    })
}

fn io_error(collection: &dyn Collection, source: StoreError) -> IdFactoryError {
    tracing::warn!(
        collection = %collection.name(),
        error = %source,
        "Id counter update failed"
    );
    IdFactoryError::Io {
        collection: collection.name().to_string(),
        source,
    }
}
