//! Heuristic supplier ranking with progressive filter relaxation.
//!
//! Given a lot (category, region, start price) the [`SupplierRanker`] searches the
//! [`ProfileIndex`](crate::profile::ProfileIndex) level by level:
//!
//! 1. category + region + price band
//! 2. category + region
//! 3. category
//! 4. wider OKPD2 prefixes, one segment at a time
//! 5. any supplier with a win
//!
//! and stops once enough candidates were found. Candidates keep the level that admitted
//! them and are listed after every candidate of a stricter level; their score is also
//! scaled by the level multiplier. Large levels are scored in two stages (history-only pre-selection, then the full
//! weighted score).

pub mod config;
pub mod error;
pub mod evaluation;
pub mod relaxation;
pub mod scorer;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::{RankingConfig, ScoreWeights};
pub use error::{RankResult, RankingError};
pub use evaluation::{HitRateReport, evaluate_hit_rate};
pub use relaxation::{admits, ladder};
pub use scorer::SupplierRanker;
pub use types::{LotQuery, RankedSupplier, RankingOutcome, RelaxationLevel, ScoreBreakdown};
