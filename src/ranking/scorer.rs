use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::constants::WIN_RATE_PRIOR_STRENGTH;
use crate::profile::{ProfileIndex, SupplierProfile};

use super::config::{RankingConfig, ScoreWeights};
use super::error::{RankResult, RankingError};
use super::relaxation::{admits, ladder};
use super::types::{LotQuery, RankedSupplier, RankingOutcome, RelaxationLevel, ScoreBreakdown};

/// Index-wide values every score needs.
#[derive(Debug, Clone, Copy)]
struct ScoringContext {
    prior: f64,
    max_log_participations: f64,
    newest_activity: Option<NaiveDate>,
}

impl ScoringContext {
    fn from_index(index: &ProfileIndex) -> Self {
        Self {
            prior: index.global_win_rate(),
            max_log_participations: (1.0 + index.max_participations() as f64).ln(),
            newest_activity: index.newest_activity(),
        }
    }
}

/// Rule-based supplier ranking over a [`ProfileIndex`].
///
/// Walks the relaxation ladder until enough candidates were collected, scoring each level
/// with the weighted feature sum. Levels that admit more than `refine_threshold` suppliers
/// are pre-selected with a coarse score before the full score is computed.
#[derive(Debug, Clone)]
pub struct SupplierRanker {
    config: RankingConfig,
    weights: ScoreWeights,
}

impl Default for SupplierRanker {
    fn default() -> Self {
        let config = RankingConfig::default();
        let weights = config.weights.normalized();
        Self { config, weights }
    }
}

impl SupplierRanker {
    pub fn new(config: RankingConfig) -> RankResult<Self> {
        config.validate()?;
        let weights = config.weights.normalized();
        Ok(Self { config, weights })
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn rank(&self, index: &ProfileIndex, query: &LotQuery) -> RankResult<RankingOutcome> {
        if query.top_k == 0 {
            return Err(RankingError::InvalidQuery {
                reason: "top_k must be at least 1".to_string(),
            });
        }
        if let Some(price) = query.start_price
            && !(price.is_finite() && price > 0.0)
        {
            return Err(RankingError::InvalidQuery {
                reason: format!("start price must be positive, got {price}"),
            });
        }

        let query = query.normalized();

        if index.is_empty() {
            debug!("Ranking against an empty profile index");
            return Ok(RankingOutcome::default());
        }

        let ctx = ScoringContext::from_index(index);
        let min_candidates = self.config.min_candidates.unwrap_or(query.top_k).max(1);
        let excluded: HashSet<&str> = query.exclude.iter().map(String::as_str).collect();

        let mut outcome = RankingOutcome::default();
        let mut taken: HashSet<String> = HashSet::new();

        for level in ladder(&query) {
            outcome.levels_tried += 1;

            let admitted: Vec<&SupplierProfile> = index
                .profiles()
                .filter(|p| p.participations >= self.config.min_participations)
                .filter(|p| !excluded.contains(p.post_num.as_str()))
                .filter(|p| !taken.contains(&p.post_num))
                .filter(|p| admits(&level, p, &query, self.config.price_band))
                .collect();

            debug!(level = %level, admitted = admitted.len(), "Relaxation level evaluated");

            if admitted.is_empty() {
                continue;
            }

            // Suppliers cut by the coarse stage stay attributed to this level.
            taken.extend(admitted.iter().map(|p| p.post_num.clone()));

            let (mut scored, refined) = self.score_level(&level, admitted, &query, &ctx);
            outcome.refined |= refined;
            sort_ranked(&mut scored);

            outcome.candidates.extend(scored);
            outcome.level_reached = Some(level);

            if outcome.candidates.len() >= min_candidates {
                break;
            }
        }

        outcome.candidates.truncate(query.top_k);

        info!(
            candidates = outcome.candidates.len(),
            levels_tried = outcome.levels_tried,
            level_reached = ?outcome.level_reached.as_ref().map(|l| l.label()),
            refined = outcome.refined,
            "Ranking complete"
        );

        Ok(outcome)
    }

    fn score_level(
        &self,
        level: &RelaxationLevel,
        admitted: Vec<&SupplierProfile>,
        query: &LotQuery,
        ctx: &ScoringContext,
    ) -> (Vec<RankedSupplier>, bool) {
        let (survivors, refined) = if admitted.len() > self.config.refine_threshold {
            let keep = self.config.coarse_keep.max(query.top_k);
            (self.coarse_select(admitted, keep, ctx), true)
        } else {
            (admitted, false)
        };

        let scored = survivors
            .into_iter()
            .map(|profile| self.score_profile(level, profile, query, ctx))
            .collect();

        (scored, refined)
    }

    /// Stage one of the two-stage scoring: keep the best `keep` by history alone.
    fn coarse_select<'a>(
        &self,
        mut admitted: Vec<&'a SupplierProfile>,
        keep: usize,
        ctx: &ScoringContext,
    ) -> Vec<&'a SupplierProfile> {
        let total = self.weights.win_rate + self.weights.experience;
        let coarse = |p: &SupplierProfile| {
            let win_rate = p.win_rate_smoothed(ctx.prior, WIN_RATE_PRIOR_STRENGTH);
            let experience = experience(p, ctx);
            if total > 0.0 {
                (self.weights.win_rate * win_rate + self.weights.experience * experience) / total
            } else {
                experience
            }
        };

        let before = admitted.len();
        admitted.sort_by(|a, b| {
            coarse(b)
                .partial_cmp(&coarse(a))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.post_num.cmp(&b.post_num))
        });
        admitted.truncate(keep);

        debug!(before, after = admitted.len(), "Coarse pre-selection applied");
        admitted
    }

    fn score_profile(
        &self,
        level: &RelaxationLevel,
        profile: &SupplierProfile,
        query: &LotQuery,
        ctx: &ScoringContext,
    ) -> RankedSupplier {
        let breakdown = ScoreBreakdown {
            win_rate: profile.win_rate_smoothed(ctx.prior, WIN_RATE_PRIOR_STRENGTH),
            experience: experience(profile, ctx),
            category: category_fit(level, profile, query),
            region: query
                .region
                .as_deref()
                .map(|r| profile.region_affinity(r))
                .unwrap_or(0.5),
            price: price_fit(profile, query, self.config.price_band),
            recency: recency(profile, ctx, self.config.recency_days),
            multiplier: level.multiplier(),
        };

        let w = &self.weights;
        let weighted = w.win_rate * breakdown.win_rate
            + w.experience * breakdown.experience
            + w.category * breakdown.category
            + w.region * breakdown.region
            + w.price * breakdown.price
            + w.recency * breakdown.recency;

        RankedSupplier {
            post_num: profile.post_num.clone(),
            score: breakdown.multiplier * weighted,
            level: level.clone(),
            breakdown,
        }
    }
}

/// Sorts by score descending, ties by `post_num` ascending.
fn sort_ranked(candidates: &mut [RankedSupplier]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.post_num.cmp(&b.post_num))
    });
}

fn experience(profile: &SupplierProfile, ctx: &ScoringContext) -> f64 {
    if ctx.max_log_participations <= 0.0 {
        return 0.0;
    }
    ((1.0 + profile.participations as f64).ln() / ctx.max_log_participations).min(1.0)
}

fn category_fit(level: &RelaxationLevel, profile: &SupplierProfile, query: &LotQuery) -> f64 {
    let okpd2 = query.okpd2_code.as_deref();
    match level {
        RelaxationLevel::CategoryPrefix { prefix, .. } => profile.category_affinity(prefix),
        RelaxationLevel::Global => match okpd2.and_then(|c| c.split('.').next()) {
            Some(class) => profile.category_affinity(class),
            None => 0.5,
        },
        _ => match (query.ktru_code.as_deref(), okpd2) {
            (Some(ktru), Some(code)) => profile.ktru_affinity(ktru).max(profile.category_affinity(code)),
            (Some(ktru), None) => profile.ktru_affinity(ktru),
            (None, Some(code)) => profile.category_affinity(code),
            (None, None) => 0.5,
        },
    }
}

/// `1` when the typical lot price equals the query price, falling to `0` at a
/// `1 + 2 * band` ratio in either direction.
pub(crate) fn price_fit(profile: &SupplierProfile, query: &LotQuery, band: f64) -> f64 {
    match (query.start_price, profile.typical_lot_price()) {
        (Some(start), Some(typical)) if start > 0.0 && typical > 0.0 => {
            let scale = (1.0 + 2.0 * band).ln();
            (1.0 - (typical / start).ln().abs() / scale).max(0.0)
        }
        _ => 0.5,
    }
}

fn recency(profile: &SupplierProfile, ctx: &ScoringContext, recency_days: i64) -> f64 {
    recency_score(ctx.newest_activity, profile.last_activity_date(), recency_days)
}

/// `1` within `recency_days` of the newest activity in the index, falling linearly to `0`
/// at three times that; `0.5` when either date is unknown.
pub(crate) fn recency_score(
    newest: Option<NaiveDate>,
    last: Option<NaiveDate>,
    recency_days: i64,
) -> f64 {
    let (Some(newest), Some(last)) = (newest, last) else {
        return 0.5;
    };

    let days = (newest - last).num_days().max(0) as f64;
    let window = recency_days as f64;
    if days <= window {
        1.0
    } else if days >= 3.0 * window {
        0.0
    } else {
        1.0 - (days - window) / (2.0 * window)
    }
}
