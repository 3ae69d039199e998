//! Supplier recommendation for public procurement lots.
//!
//! The crate turns raw tender/lot/participant exports into merged interactions
//! ([`data`]), aggregates them into supplier profiles ([`profile`]) and ranks suppliers
//! for a new lot with a rule-based scorer that relaxes its filters step by step
//! ([`ranking`]). Trainable alternatives (winner classifier, price regressor, two-tower
//! recommender with a binary-quantized retrieval index) live in [`models`].
//!
//! Binary artifacts are persisted through [`storage`]; every tunable is read from
//! `TENDER_*` environment variables (see [`config`]).

pub mod config;
pub mod constants;
pub mod data;
pub mod hashing;
pub mod models;
pub mod profile;
pub mod ranking;
pub mod storage;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::{Config, ConfigError};
pub use data::{DataError, Interaction, PrepareReport};
pub use hashing::{hash_feature, holdout_bucket, stable_id};
pub use models::{ModelError, TrainConfig};
pub use profile::{IngestReport, ProfileError, ProfileIndex, SupplierProfile};
pub use ranking::{
    HitRateReport, LotQuery, RankedSupplier, RankingConfig, RankingError, RankingOutcome,
    RelaxationLevel, SupplierRanker, evaluate_hit_rate,
};
pub use storage::{SnapshotStore, StorageError};
