use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::contracts::{
    Collection, Document, LockResultExt, StoreError, StoreProvider, UpsertOutcome,
};

/// In-process store with the same atomicity guarantees as the RocksDB store.
///
/// Every handle returned for a name shares the same documents, so several
/// factories built on one `MemoryStore` behave like separate processes
/// sharing a database. Also carries fault injection and access counting for tests.
pub struct MemoryStore {
    base_uri: String,
    collections: DashMap<String, Arc<MemoryCollection>>,
    /// Number of upcoming writes that will report `Unacknowledged`
    pending_failures: Arc<AtomicU32>,
    accesses: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
            collections: DashMap::new(),
            pending_failures: Arc::new(AtomicU32::new(0)),
            accesses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Makes the next `count` writes (in any collection) fail with
    /// `StoreError::Unacknowledged` without being applied.
    pub fn fail_next_writes(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    /// Total number of provider and collection calls made so far.
    pub fn access_count(&self) -> u64 {
        self.accesses.load(Ordering::SeqCst)
    }

    /// Returns the concrete collection for inspection, if it exists.
    pub fn get_collection(&self, name: &str) -> Option<Arc<MemoryCollection>> {
        self.collections.get(name).map(|c| Arc::clone(c.value()))
    }

    /// Forgets a collection. Handles obtained earlier keep the old documents.
    pub fn drop_collection(&self, name: &str) {
        self.collections.remove(name);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory://localhost")
    }
}

impl StoreProvider for MemoryStore {
    fn connection_uri(&self) -> &str {
        &self.base_uri
    }

    fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, StoreError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        if name.is_empty() {
            return Err(StoreError::InvalidInput("empty collection name".into()));
        }

        let collection: Arc<dyn Collection> = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(MemoryCollection {
                    name: name.to_string(),
                    documents: RwLock::new(HashMap::new()),
                    pending_failures: Arc::clone(&self.pending_failures),
                    accesses: Arc::clone(&self.accesses),
                })
            })
            .value()
            .clone();

        Ok(collection)
    }
}

pub struct MemoryCollection {
    name: String,
    documents: RwLock<HashMap<String, Document>>,
    pending_failures: Arc<AtomicU32>,
    accesses: Arc<AtomicU64>,
}

impl MemoryCollection {
    /// Number of documents in the collection.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.documents.read().map_lock_err()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Consumes one injected failure, if any are pending.
    fn take_failure(&self) -> bool {
        self.pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_one(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.read().map_lock_err()?.get(id).cloned())
    }

    fn upsert_if_absent(&self, document: &Document) -> Result<UpsertOutcome, StoreError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(StoreError::Unacknowledged(format!(
                "insert of '{}' into '{}'",
                document.id, self.name
            )));
        }

        let mut documents = self.documents.write().map_lock_err()?;
        if documents.contains_key(&document.id) {
            return Ok(UpsertOutcome::AlreadyPresent);
        }
        documents.insert(document.id.clone(), document.clone());
        Ok(UpsertOutcome::Inserted)
    }

    fn increment_and_fetch(
        &self,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<Option<Document>, StoreError> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(StoreError::Unacknowledged(format!(
                "update of '{}' in '{}'",
                id, self.name
            )));
        }

        // The write lock spans the whole read-modify-write
        let mut documents = self.documents.write().map_lock_err()?;
        match documents.get_mut(id) {
            Some(document) => {
                document.increment(field, delta)?;
                Ok(Some(document.clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_share_documents() {
        let store = MemoryStore::default();
        let a = store.collection("ids").unwrap();
        let b = store.collection("ids").unwrap();

        a.upsert_if_absent(&Document::new("0").with_field("n", 0))
            .unwrap();
        b.increment_and_fetch("0", "n", 1).unwrap();

        assert_eq!(a.find_one("0").unwrap().unwrap().get("n"), Some(1));
    }

    #[test]
    fn collections_are_isolated() {
        let store = MemoryStore::default();
        let a = store.collection("a").unwrap();
        let b = store.collection("b").unwrap();

        a.upsert_if_absent(&Document::new("0")).unwrap();
        assert!(b.find_one("0").unwrap().is_none());
    }

    #[test]
    fn upsert_never_overwrites() {
        let store = MemoryStore::default();
        let c = store.collection("ids").unwrap();

        let first = c
            .upsert_if_absent(&Document::new("0").with_field("n", 7))
            .unwrap();
        let second = c
            .upsert_if_absent(&Document::new("0").with_field("n", 0))
            .unwrap();

        assert_eq!(first, UpsertOutcome::Inserted);
        assert_eq!(second, UpsertOutcome::AlreadyPresent);
        assert_eq!(c.find_one("0").unwrap().unwrap().get("n"), Some(7));
    }

    #[test]
    fn increment_missing_document_returns_none() {
        let store = MemoryStore::default();
        let c = store.collection("ids").unwrap();
        assert!(c.increment_and_fetch("0", "n", 1).unwrap().is_none());
    }

    #[test]
    fn injected_failure_is_not_applied() {
        let store = MemoryStore::default();
        let c = store.collection("ids").unwrap();
        c.upsert_if_absent(&Document::new("0").with_field("n", 0))
            .unwrap();

        store.fail_next_writes(1);
        let err = c.increment_and_fetch("0", "n", 1).unwrap_err();
        assert!(matches!(err, StoreError::Unacknowledged(_)));
        assert_eq!(c.find_one("0").unwrap().unwrap().get("n"), Some(0));

        let doc = c.increment_and_fetch("0", "n", 1).unwrap().unwrap();
        assert_eq!(doc.get("n"), Some(1));
    }

    #[test]
    fn empty_collection_name_is_invalid() {
        let store = MemoryStore::default();
        assert!(matches!(
            store.collection(""),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn drop_collection_clears_documents() {
        let store = MemoryStore::default();
        let c = store.collection("ids").unwrap();
        assert!(store.get_collection("ids").unwrap().is_empty().unwrap());

        c.upsert_if_absent(&Document::new("0")).unwrap();
        let inspected = store.get_collection("ids").unwrap();
        assert!(!inspected.is_empty().unwrap());
        assert_eq!(inspected.len().unwrap(), 1);

        store.drop_collection("ids");
        assert!(store.get_collection("ids").is_none());
        assert!(store
            .collection("ids")
            .unwrap()
            .find_one("0")
            .unwrap()
            .is_none());
    }

    #[test]
    fn access_count_tracks_calls() {
        let store = MemoryStore::default();
        assert_eq!(store.access_count(), 0);

        let c = store.collection("ids").unwrap();
        c.find_one("0").unwrap();
        assert_eq!(store.access_count(), 2);
    }
}
