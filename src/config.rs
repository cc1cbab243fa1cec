//! Startup configuration, read from `SEQSTORE_*` environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

/// Property key holding the collection name in a component property map.
pub const PROP_COLLECTION: &str = "collection";

/// Returns a validation message if `name` is not a usable collection name.
pub fn validate_collection_name(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        return Some("The collection was not specified as part of the component configuration");
    }
    None
}

/// Configuration for an id factory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdFactoryConfig {
    /// Name of the backing collection holding the counter record.
    pub collection_name: String,
}

impl IdFactoryConfig {
    pub fn new(collection_name: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
        }
    }

    /// Reads `SEQSTORE_COLLECTION`. A missing variable yields an empty name,
    /// which `initialize` rejects.
    pub fn from_env() -> Self {
        Self {
            collection_name: std::env::var("SEQSTORE_COLLECTION").unwrap_or_default(),
        }
    }

    /// Reads the `collection` key of a component property map.
    pub fn from_properties(properties: &HashMap<String, String>) -> Self {
        Self {
            collection_name: properties.get(PROP_COLLECTION).cloned().unwrap_or_default(),
        }
    }
}

/// Configuration for the RocksDB-backed store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    /// Base URI reported by the store. Defaults to `rocksdb://<data_dir>`.
    pub base_uri: Option<String>,
    /// fsync the WAL before a counter update is acknowledged. Turning this
    /// off lets a crash roll back ids that were already handed out.
    pub sync_writes: bool,
    /// How long a writer waits for the counter row lock.
    pub lock_timeout_ms: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            base_uri: None,
            sync_writes: true,
            lock_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    /// Creates a StoreConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SEQSTORE_DATA_DIR`: RocksDB directory (default: ./data)
    /// - `SEQSTORE_BASE_URI`: Base URI override
    /// - `SEQSTORE_SYNC_WRITES`: `false`/`0` to skip the fsync on each update (default: true)
    /// - `SEQSTORE_LOCK_TIMEOUT_MS`: Row lock wait in ms (default: 5000)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            data_dir: std::env::var("SEQSTORE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.data_dir),
            base_uri: std::env::var("SEQSTORE_BASE_URI")
                .ok()
                .filter(|v| !v.is_empty()),
            sync_writes: std::env::var("SEQSTORE_SYNC_WRITES")
                .ok()
                .and_then(|v| match v.to_ascii_lowercase().as_str() {
                    "1" | "true" => Some(true),
                    "0" | "false" => Some(false),
                    _ => None,
                })
                .unwrap_or(default.sync_writes),
            lock_timeout_ms: std::env::var("SEQSTORE_LOCK_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|ms: &i64| *ms > 0)
                .unwrap_or(default.lock_timeout_ms),
        }
    }

    /// Returns the configured base URI, or `rocksdb://<data_dir>`.
    pub fn resolved_base_uri(&self) -> String {
        match self.base_uri {
            Some(ref uri) => uri.trim_end_matches('/').to_string(),
            None => format!("rocksdb://{}", self.data_dir.display()),
        }
    }
}
