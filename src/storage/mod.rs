//! On-disk persistence for archived artifacts (profile index, retrieval index).

pub mod error;
pub mod snapshot;


pub use error::{StorageError, StorageResult};
pub use snapshot::SnapshotStore;
