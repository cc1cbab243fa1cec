use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use rocksdb::{
    Direction, IteratorMode, Options, TransactionDB, TransactionDBOptions, TransactionOptions,
    WriteOptions,
};

use crate::config::StoreConfig;
use crate::contracts::{Collection, Document, StoreError, StoreProvider, UpsertOutcome};

/// Key prefix for documents
const DOC_PREFIX: &str = "doc";

/// RocksDB-backed document store.
///
/// Each document is one key, `doc:{collection}:{id}`, holding the
/// bincode-encoded `Document`. Writes go through pessimistic transactions:
/// `get_for_update` takes an exclusive row lock, so concurrent increments of
/// the same document serialize inside RocksDB.
pub struct RocksDbStore {
    db: Arc<TransactionDB>,
    base_uri: String,
    sync_writes: bool,
    /// Cached collection handles (lock-free concurrent map)
    collections: DashMap<String, Arc<RocksDbCollection>>,
}

impl RocksDbStore {
    /// Opens or creates a store at the given path with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let config = StoreConfig {
            data_dir: path.as_ref().to_path_buf(),
            ..StoreConfig::default()
        };
        Self::open_with_config(&config)
    }

    /// Opens or creates a store as described by `config`.
    pub fn open_with_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(config.lock_timeout_ms);

        let db: TransactionDB = TransactionDB::open(&opts, &txn_db_opts, &config.data_dir)
            .map_err(|e| StoreError::RocksDb(e.to_string()))?;

        let base_uri = config.resolved_base_uri();
        tracing::info!(
            path = %config.data_dir.display(),
            uri = %base_uri,
            sync_writes = config.sync_writes,
            "Opened RocksDB document store"
        );

        Ok(Self {
            db: Arc::new(db),
            base_uri,
            sync_writes: config.sync_writes,
            collections: DashMap::new(),
        })
    }

    /// Counts the documents stored in a collection.
    pub fn document_count(&self, collection: &str) -> Result<usize, StoreError> {
        let prefix = collection_prefix(collection);
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));

        let mut count = 0;
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::RocksDb(e.to_string()))?;
            // Byte-based prefix check (no String allocation)
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

impl StoreProvider for RocksDbStore {
    fn connection_uri(&self) -> &str {
        &self.base_uri
    }

    fn collection(&self, name: &str) -> Result<Arc<dyn Collection>, StoreError> {
        if name.is_empty() {
            return Err(StoreError::InvalidInput("empty collection name".into()));
        }
        if name.contains(':') {
            return Err(StoreError::InvalidInput(format!(
                "collection name '{}' must not contain ':'",
                name
            )));
        }

        let collection: Arc<dyn Collection> = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(RocksDbCollection {
                    db: Arc::clone(&self.db),
                    name: name.to_string(),
                    prefix: collection_prefix(name),
                    sync_writes: self.sync_writes,
                })
            })
            .value()
            .clone();

        Ok(collection)
    }
}

/// Creates the key prefix shared by every document of a collection.
fn collection_prefix(collection: &str) -> String {
    format!("{}:{}:", DOC_PREFIX, collection)
}

/// Handle to one collection of a `RocksDbStore`.
pub struct RocksDbCollection {
    db: Arc<TransactionDB>,
    name: String,
    prefix: String,
    sync_writes: bool,
}

impl RocksDbCollection {
    fn document_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }

    fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.sync_writes);
        opts
    }

    fn serialize(document: &Document) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(document).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn deserialize(bytes: &[u8]) -> Result<Document, StoreError> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Runs a read-modify-write on one document inside a transaction.
    ///
    /// `update` sees the current document (if any) and returns the document
    /// to write, or `None` to leave the key untouched. The row lock is held
    /// from the read until commit.
    fn read_modify_write<T>(
        &self,
        id: &str,
        update: impl FnOnce(Option<Document>) -> Result<(Option<Document>, T), StoreError>,
    ) -> Result<T, StoreError> {
        let key = self.document_key(id);
        let txn = self
            .db
            .transaction_opt(&self.write_options(), &TransactionOptions::default());

        let current = txn
            .get_for_update(key.as_bytes(), true)
            .map_err(|e| StoreError::RocksDb(e.to_string()))?
            .map(|bytes| Self::deserialize(&bytes))
            .transpose()?;

        let (next, result) = update(current)?;

        if let Some(document) = next {
            txn.put(key.as_bytes(), Self::serialize(&document)?)
                .map_err(|e| StoreError::RocksDb(e.to_string()))?;
        }

        // A failed commit leaves the stored value as it was
        txn.commit()
            .map_err(|e| StoreError::Unacknowledged(format!("{}: {}", key, e)))?;

        Ok(result)
    }
}

impl Collection for RocksDbCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn find_one(&self, id: &str) -> Result<Option<Document>, StoreError> {
        let key = self.document_key(id);
        match self.db.get(key.as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize(&bytes)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::RocksDb(e.to_string())),
        }
    }

    fn upsert_if_absent(&self, document: &Document) -> Result<UpsertOutcome, StoreError> {
        self.read_modify_write(&document.id, |current| match current {
            Some(_) => Ok((None, UpsertOutcome::AlreadyPresent)),
            None => Ok((Some(document.clone()), UpsertOutcome::Inserted)),
        })
    }

    fn increment_and_fetch(
        &self,
        id: &str,
        field: &str,
        delta: i64,
    ) -> Result<Option<Document>, StoreError> {
        self.read_modify_write(id, |current| match current {
            Some(mut document) => {
                document.increment(field, delta)?;
                Ok((Some(document.clone()), Some(document)))
            }
            None => Ok((None, None)),
        })
    }
}
