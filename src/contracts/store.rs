use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::contracts::error::StoreError;

/// Supplies named collections and the base URI of the connection.
pub trait StoreProvider: Send + Sync {
    /// Returns the base URI of the store connection (no trailing slash).
    fn connection_uri(&self) -> &str;

    /// Returns a handle to the named collection, creating it if needed.
    fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, StoreError>;
}

/// A named namespace of documents inside a store.
///
/// # Invariants
/// - Document ids are unique within a collection
/// - `upsert_if_absent` never overwrites an existing document
/// - `increment_and_fetch` is a single indivisible operation, safe under
///   concurrent callers in any number of handles to the same collection
pub trait Collection: Send + Sync {
    /// Returns the collection name.
    fn name(&self) -> &str;

    /// Looks up a document by id.
    fn find_one(&self, id: &str) -> Result<Option<Document>, StoreError>;

    /// Inserts `document` only if no document with the same id exists.
    /// Returns `Err(StoreError::Unacknowledged)` if the write was not applied.
    fn upsert_if_absent(&self, document: &Document) -> Result<UpsertOutcome, StoreError>;

    /// Atomically adds `delta` to `field` of document `id` and returns the
    /// document as it is after the update.
    /// A missing field counts as 0. Returns `Ok(None)` if no document has that id.
    fn increment_and_fetch(
        &self,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<Option<Document>, StoreError>;
}

/// Result of `Collection::upsert_if_absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    AlreadyPresent,
}

/// A stored record: an id plus named integer fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: BTreeMap<String, i64>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, field: impl Into<String>, value: i64) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn get(&self, field: &str) -> Option<i64> {
        self.fields.get(field).copied()
    }

    /// Adds `delta` to `field` in place, treating a missing field as 0.
    /// Returns the new value.
    pub fn increment(&mut self, field: &str, delta: i64) -> Result<i64, StoreError> {
        let current = self.get(field).unwrap_or(0);
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::Overflow {
                id: self.id.clone(),
                field: field.to_string(),
            })?;
        self.fields.insert(field.to_string(), next);
        Ok(next)
    }
}
