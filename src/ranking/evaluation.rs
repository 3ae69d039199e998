//! Offline hit-rate evaluation of the heuristic ranker.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::data::Interaction;
use crate::profile::ProfileIndex;

use super::error::{RankResult, RankingError};
use super::scorer::SupplierRanker;
use super::types::LotQuery;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HitRateReport {
    pub k: usize,
    pub lots_evaluated: usize,
    /// Holdout lots without a winner.
    pub skipped_no_winner: usize,
    /// Holdout lots whose winner never appears in the training history.
    pub skipped_unknown_winner: usize,
    pub hits: usize,
    pub hit_rate: f64,
    pub mean_reciprocal_rank: f64,
    /// How many evaluated lots stopped at each relaxation level.
    pub levels: BTreeMap<String, usize>,
}

/// Ranks every holdout lot against an index built from `train` and checks whether the
/// actual winner lands in the top `k`.
pub fn evaluate_hit_rate(
    ranker: &SupplierRanker,
    train: &[Interaction],
    holdout: &[Interaction],
    k: usize,
) -> RankResult<HitRateReport> {
    if k == 0 {
        return Err(RankingError::InvalidQuery {
            reason: "k must be at least 1".to_string(),
        });
    }

    let index = ProfileIndex::build(train);

    let mut lots: BTreeMap<&str, Vec<&Interaction>> = BTreeMap::new();
    for row in holdout {
        lots.entry(row.pn_lot.as_str()).or_default().push(row);
    }

    let mut report = HitRateReport {
        k,
        ..Default::default()
    };
    let mut reciprocal_sum = 0.0;

    for rows in lots.values() {
        let Some(winner) = rows.iter().find(|r| r.is_winner) else {
            report.skipped_no_winner += 1;
            continue;
        };
        if !index.contains(&winner.post_num) {
            report.skipped_unknown_winner += 1;
            continue;
        }

        let outcome = ranker.rank(&index, &LotQuery::from_interaction(winner, k))?;
        report.lots_evaluated += 1;

        let label = outcome
            .level_reached
            .as_ref()
            .map(|l| l.label())
            .unwrap_or_else(|| "none".to_string());
        *report.levels.entry(label).or_default() += 1;

        if let Some(position) = outcome.position_of(&winner.post_num) {
            report.hits += 1;
            reciprocal_sum += 1.0 / position as f64;
        }
    }

    if report.lots_evaluated > 0 {
        report.hit_rate = report.hits as f64 / report.lots_evaluated as f64;
        report.mean_reciprocal_rank = reciprocal_sum / report.lots_evaluated as f64;
    }

    info!(
        k,
        lots = report.lots_evaluated,
        hit_rate = report.hit_rate,
        mrr = report.mean_reciprocal_rank,
        "Heuristic ranker evaluated"
    );

    Ok(report)
}
