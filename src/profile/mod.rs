//! Supplier profiles and the incremental profile index.
//!
//! The index is the input of the heuristic ranker and of the classifier features. It is
//! built from merged interactions and persisted through [`SnapshotStore`](crate::storage::SnapshotStore).

pub mod error;
pub mod index;
pub mod model;

#[cfg(test)]
mod tests;

pub use error::{ProfileError, ProfileResult};
pub use index::{IngestReport, ProfileIndex, ProfileSnapshot};
pub use model::{CountEntry, SupplierProfile, code_matches_prefix};
