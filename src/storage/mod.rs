pub mod counter;
mod memory;
pub mod retry;
mod rocksdb;
mod sequence;

pub use counter::{ensure_counter, increment_counter, LAST_ID_FIELD, SENTINEL_ID};
pub use memory::{MemoryCollection, MemoryStore};
pub use retry::{next_id_with_retry, RetryConfig};
pub use rocksdb::{RocksDbCollection, RocksDbStore};
pub use sequence::StoreIdFactory;
