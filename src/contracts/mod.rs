pub mod error;
pub mod sequence;
pub mod store;

pub use error::{IdFactoryError, LockResultExt, StoreError};
pub use sequence::IdFactory;
pub use store::{Collection, Document, StoreProvider, UpsertOutcome};
