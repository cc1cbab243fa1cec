use std::sync::{Arc, OnceLock};

use crate::config::{validate_collection_name, IdFactoryConfig};
use crate::contracts::{Collection, IdFactory, IdFactoryError, StoreProvider};
use crate::storage::counter::{ensure_counter, increment_counter};

/// Id factory backed by a counter record in a shared store collection.
///
/// Holds no counter state of its own: every `next_id` is one atomic
/// increment in the store, so any number of factories (in this process or
/// others) can share a collection. Must be `initialize`d before use.
pub struct StoreIdFactory<P: StoreProvider> {
    provider: Arc<P>,
    config: IdFactoryConfig,
    uri: OnceLock<String>,
    collection: OnceLock<Arc<dyn Collection>>,
}

impl<P: StoreProvider> StoreIdFactory<P> {
    /// Creates an uninitialized factory. Nothing touches the store until `initialize`.
    pub fn new(provider: Arc<P>, config: IdFactoryConfig) -> Self {
        Self {
            provider,
            config,
            uri: OnceLock::new(),
            collection: OnceLock::new(),
        }
    }

    /// Creates a factory and initializes it.
    pub fn open(provider: Arc<P>, config: IdFactoryConfig) -> Result<Self, IdFactoryError> {
        let factory = Self::new(provider, config);
        factory.initialize()?;
        Ok(factory)
    }

    /// Validates the configuration, creates the counter record if the
    /// collection has none, and binds the collection.
    ///
    /// An empty collection name fails before any store access. Calling this
    /// again after success does nothing.
    pub fn initialize(&self) -> Result<(), IdFactoryError> {
        if self.is_initialized() {
            return Ok(());
        }

        let name = self.config.collection_name.as_str();
        if let Some(message) = validate_collection_name(name) {
            return Err(IdFactoryError::Configuration(message.into()));
        }

        let collection = self.provider.collection(name).map_err(|e| {
            IdFactoryError::Configuration(format!("Could not open collection '{}': {}", name, e))
        })?;
        ensure_counter(collection.as_ref())?;

        // Concurrent initializers resolve the same values; the first set wins
        let _ = self
            .uri
            .set(format!("{}/{}", self.provider.connection_uri(), name));
        let _ = self.collection.set(collection);

        tracing::info!(
            collection = %name,
            uri = self.collection_uri().unwrap_or_default(),
            "Id factory initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.collection.get().is_some()
    }

    pub fn collection_name(&self) -> &str {
        &self.config.collection_name
    }
}

impl<P: StoreProvider> IdFactory for StoreIdFactory<P> {
    fn next_id(&self) -> Result<Option<String>, IdFactoryError> {
        let Some(collection) = self.collection.get() else {
            tracing::debug!(
                collection = %self.config.collection_name,
                "Id requested before initialization"
            );
            return Ok(None);
        };

        let value = increment_counter(collection.as_ref())?;
        Ok(Some(value.to_string()))
    }

    fn collection_uri(&self) -> Option<&str> {
        self.uri.get().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::counter::{LAST_ID_FIELD, SENTINEL_ID};
    use crate::storage::MemoryStore;

    fn memory_factory(collection: &str) -> (StoreIdFactory<MemoryStore>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("mongodb://localhost/junit"));
        let factory = StoreIdFactory::new(Arc::clone(&store), IdFactoryConfig::new(collection));
        (factory, store)
    }

    #[test]
    fn next_id_counts_up_from_one() {
        let (factory, _store) = memory_factory("ids");
        factory.initialize().unwrap();

        for expected in 1..=100u64 {
            assert_eq!(factory.next_id().unwrap(), Some(expected.to_string()));
        }
    }

    #[test]
    fn first_id_updates_stored_counter() {
        let (factory, store) = memory_factory("junit_id");
        factory.initialize().unwrap();

        let collection = store.collection("junit_id").unwrap();
        let record = collection.find_one(SENTINEL_ID).unwrap().unwrap();
        assert_eq!(record.get(LAST_ID_FIELD), Some(0));

        assert_eq!(factory.next_id().unwrap().as_deref(), Some("1"));

        let record = collection.find_one(SENTINEL_ID).unwrap().unwrap();
        assert_eq!(record.get(LAST_ID_FIELD), Some(1));
    }

    #[test]
    fn uninitialized_factory_returns_none_without_store_access() {
        let (factory, store) = memory_factory("ids");

        assert_eq!(factory.next_id().unwrap(), None);
        assert_eq!(factory.collection_uri(), None);
        assert_eq!(store.access_count(), 0);
    }

    #[test]
    fn empty_collection_name_fails_before_store_access() {
        let (factory, store) = memory_factory("");

        let err = factory.initialize().unwrap_err();
        assert!(matches!(err, IdFactoryError::Configuration(_)));
        assert_eq!(store.access_count(), 0);
        assert!(!factory.is_initialized());
    }

    #[test]
    fn collection_uri_is_base_plus_name() {
        let (factory, _store) = memory_factory("junit_id");
        factory.initialize().unwrap();

        assert_eq!(
            factory.collection_uri(),
            Some("mongodb://localhost/junit/junit_id")
        );
        for _ in 0..10 {
            factory.next_id().unwrap();
        }
        assert_eq!(
            factory.collection_uri(),
            Some("mongodb://localhost/junit/junit_id")
        );
    }

    #[test]
    fn failed_counter_creation_leaves_factory_unusable() {
        let (factory, store) = memory_factory("ids");
        store.fail_next_writes(1);

        let err = factory.initialize().unwrap_err();
        assert!(matches!(err, IdFactoryError::Configuration(_)));
        assert!(!factory.is_initialized());
        assert_eq!(factory.next_id().unwrap(), None);

        factory.initialize().unwrap();
        assert_eq!(factory.next_id().unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn unacknowledged_update_does_not_skip_values() {
        let (factory, store) = memory_factory("ids");
        factory.initialize().unwrap();
        assert_eq!(factory.next_id().unwrap().as_deref(), Some("1"));

        store.fail_next_writes(1);
        let err = factory.next_id().unwrap_err();
        assert!(err.is_retryable());

        assert_eq!(factory.next_id().unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn initialize_is_idempotent() {
        let (factory, store) = memory_factory("ids");
        factory.initialize().unwrap();
        factory.next_id().unwrap();

        let accesses = store.access_count();
        factory.initialize().unwrap();
        assert_eq!(store.access_count(), accesses);
        assert_eq!(factory.next_id().unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn factories_sharing_a_collection_continue_the_sequence() {
        let store = Arc::new(MemoryStore::default());
        let first = StoreIdFactory::open(Arc::clone(&store), IdFactoryConfig::new("ids")).unwrap();
        assert_eq!(first.next_id().unwrap().as_deref(), Some("1"));
        assert_eq!(first.next_id().unwrap().as_deref(), Some("2"));

        let second =
            StoreIdFactory::open(Arc::clone(&store), IdFactoryConfig::new("ids")).unwrap();
        assert_eq!(second.next_id().unwrap().as_deref(), Some("3"));
        assert_eq!(first.next_id().unwrap().as_deref(), Some("4"));
    }

    #[test]
    fn separate_collections_have_separate_sequences() {
        let store = Arc::new(MemoryStore::default());
        let orders =
            StoreIdFactory::open(Arc::clone(&store), IdFactoryConfig::new("orders")).unwrap();
        let users =
            StoreIdFactory::open(Arc::clone(&store), IdFactoryConfig::new("users")).unwrap();

        orders.next_id().unwrap();
        orders.next_id().unwrap();
        assert_eq!(users.next_id().unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn concurrent_next_id_is_unique_and_contiguous() {
        use std::thread;

        let (factory, _store) = memory_factory("ids");
        factory.initialize().unwrap();
        let factory = Arc::new(factory);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let f = Arc::clone(&factory);
                thread::spawn(move || {
                    (0..250)
                        .map(|_| f.next_id().unwrap().unwrap().parse::<u64>().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        assert_eq!(all, (1..=2000).collect::<Vec<u64>>());
    }
}
