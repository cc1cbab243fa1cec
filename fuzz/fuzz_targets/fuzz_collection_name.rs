#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use seqstore::config::IdFactoryConfig;
use seqstore::contracts::IdFactory;
use seqstore::storage::{RocksDbStore, StoreIdFactory};
use tempfile::TempDir;

fuzz_target!(|data: &[u8]| {
    // Arbitrary collection names: special characters, unicode, separators
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RocksDbStore::open(dir.path()).unwrap());

    let name = String::from_utf8_lossy(data).into_owned();
    let factory = StoreIdFactory::new(store, IdFactoryConfig::new(name));

    // Must either fail cleanly or issue "1" then "2" - never panic
    if factory.initialize().is_ok() {
        assert_eq!(factory.next_id().unwrap().as_deref(), Some("1"));
        assert_eq!(factory.next_id().unwrap().as_deref(), Some("2"));
    } else {
        assert_eq!(factory.next_id().unwrap(), None);
    }
});
