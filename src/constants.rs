//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants from primary ones to avoid drift.
//!
//! # Weight Invariants
//!
//! The default ranking weights are normalized at scoring time, so they only need to be
//! non-negative with a positive sum. They are listed here so the CLI, the ranker and the
//! tests agree on one set of defaults.

/// Field values treated as missing after trimming (compared case-insensitively).
pub const DEFAULT_SENTINELS: &[&str] = &["Counter", "nan", "null", "None", "-", "N/A", ""];

/// Lower price quantile used for outlier clipping.
pub const DEFAULT_CLIP_LOW: f64 = 0.01;
/// Upper price quantile used for outlier clipping.
pub const DEFAULT_CLIP_HIGH: f64 = 0.99;
/// Below this many observed values a price column is left unclipped.
pub const MIN_ROWS_FOR_CLIPPING: usize = 20;

/// Share of lots routed to the holdout side of the split.
pub const DEFAULT_HOLDOUT_FRACTION: f64 = 0.2;
/// Resolution of the deterministic holdout split.
pub const HOLDOUT_BUCKETS: u64 = 10_000;

pub const DEFAULT_TOP_K: usize = 10;
pub const DEFAULT_PRICE_BAND: f64 = 0.5;
pub const DEFAULT_REFINE_THRESHOLD: usize = 200;
pub const DEFAULT_COARSE_KEEP: usize = 50;
pub const DEFAULT_RECENCY_DAYS: i64 = 180;
pub const DEFAULT_MIN_PARTICIPATIONS: u32 = 1;

/// Pseudo-count used when smoothing supplier win rates toward the global rate.
pub const WIN_RATE_PRIOR_STRENGTH: f64 = 5.0;

pub const DEFAULT_WEIGHT_WIN_RATE: f64 = 0.35;
pub const DEFAULT_WEIGHT_EXPERIENCE: f64 = 0.15;
pub const DEFAULT_WEIGHT_CATEGORY: f64 = 0.25;
pub const DEFAULT_WEIGHT_REGION: f64 = 0.10;
pub const DEFAULT_WEIGHT_PRICE: f64 = 0.10;
pub const DEFAULT_WEIGHT_RECENCY: f64 = 0.05;

/// Shortest OKPD2 prefix (the 2-digit class) the relaxation ladder widens to.
pub const MIN_CATEGORY_PREFIX_SEGMENTS: usize = 1;

pub const DEFAULT_EPOCHS: usize = 20;
pub const DEFAULT_LEARNING_RATE: f64 = 0.01;
pub const DEFAULT_BATCH_SIZE: usize = 256;
pub const DEFAULT_EMBEDDING_DIM: usize = 32;
pub const DEFAULT_NEGATIVES: usize = 4;
pub const DEFAULT_SEED: u64 = 42;

/// Width of the hashed categorical block in regressor features.
pub const HASH_BUCKETS: usize = 64;
/// Number of log-price buckets used by the two-tower lot tower.
pub const PRICE_BUCKETS: usize = 10;

pub const DEFAULT_RESCORE_CANDIDATES: usize = 100;

/// Snapshot name of the supplier profile index.
pub const PROFILE_SNAPSHOT_NAME: &str = "profiles";
/// Snapshot name of the retrieval index.
pub const RETRIEVAL_SNAPSHOT_NAME: &str = "retrieval";
