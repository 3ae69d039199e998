//! Feature extraction for the trainable models.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::WIN_RATE_PRIOR_STRENGTH;
use crate::data::{Interaction, quantile};
use crate::hashing::hash_feature;
use crate::profile::ProfileIndex;

/// Maps strings to dense ids. Id `0` is reserved for values never seen during fitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    tokens: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Vocabulary {
    /// Builds a vocabulary of the distinct values, in sorted order.
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut tokens: Vec<String> = values.into_iter().map(str::to_string).collect();
        tokens.sort();
        tokens.dedup();
        Self::from(tokens)
    }

    pub fn id(&self, token: &str) -> u32 {
        self.ids.get(token).copied().unwrap_or(0)
    }

    pub fn id_of(&self, token: Option<&str>) -> u32 {
        token.map(|t| self.id(t)).unwrap_or(0)
    }

    pub fn token(&self, id: u32) -> Option<&str> {
        id.checked_sub(1)
            .and_then(|i| self.tokens.get(i as usize))
            .map(String::as_str)
    }

    /// Number of ids including the unknown slot.
    pub fn size(&self) -> usize {
        self.tokens.len() + 1
    }

    /// Number of known tokens.
    pub fn known(&self) -> usize {
        self.tokens.len()
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(tokens: Vec<String>) -> Self {
        let ids = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32 + 1))
            .collect();
        Self { tokens, ids }
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.tokens
    }
}

/// Log-price buckets with boundaries at the quantiles of the fitted prices.
///
/// Bucket `n_buckets` is reserved for an unknown price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBuckets {
    cuts: Vec<f64>,
    n_buckets: usize,
}

impl PriceBuckets {
    pub fn fit(prices: impl IntoIterator<Item = f64>, n_buckets: usize) -> Self {
        let n_buckets = n_buckets.max(1);
        let mut logs: Vec<f64> = prices
            .into_iter()
            .filter(|p| p.is_finite() && *p > 0.0)
            .map(f64::ln)
            .collect();
        logs.sort_by(|a, b| a.total_cmp(b));

        let cuts = if logs.is_empty() {
            Vec::new()
        } else {
            (1..n_buckets)
                .map(|i| quantile(&logs, i as f64 / n_buckets as f64))
                .collect()
        };

        Self { cuts, n_buckets }
    }

    pub fn bucket(&self, price: Option<f64>) -> u32 {
        match price.filter(|p| p.is_finite() && *p > 0.0) {
            Some(p) => {
                let log = p.ln();
                self.cuts.iter().filter(|&&cut| cut <= log).count() as u32
            }
            None => self.n_buckets as u32,
        }
    }

    /// Number of ids including the unknown slot.
    pub fn size(&self) -> usize {
        self.n_buckets + 1
    }
}

pub const CLASSIFIER_FEATURES: [&str; 7] = [
    "log_start_price",
    "bid_ratio",
    "supplier_win_rate",
    "experience",
    "region_match",
    "category_affinity",
    "has_ktru",
];

/// Dense winner-classifier features from an interaction and a profile index.
///
/// When the interaction's lot is part of the index, its own contribution is removed from
/// the supplier statistics so training rows do not see their label.
#[derive(Debug, Clone, Copy)]
pub struct FeatureBuilder<'a> {
    index: &'a ProfileIndex,
    prior: f64,
    max_log_participations: f64,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(index: &'a ProfileIndex) -> Self {
        Self {
            index,
            prior: index.global_win_rate(),
            max_log_participations: (1.0 + index.max_participations() as f64).ln(),
        }
    }

    pub fn width(&self) -> usize {
        CLASSIFIER_FEATURES.len()
    }

    pub fn row(&self, interaction: &Interaction) -> Vec<f32> {
        let log_start = interaction.start_price.map(|p| p.ln_1p()).unwrap_or(0.0);
        let bid_ratio = match (interaction.bid_price, interaction.start_price) {
            (Some(bid), Some(start)) if start > 0.0 => (bid / start).clamp(0.0, 3.0),
            _ => 1.0,
        };

        let stats = self.supplier_stats(interaction);
        let win_rate = (stats.wins + self.prior * WIN_RATE_PRIOR_STRENGTH)
            / (stats.participations + WIN_RATE_PRIOR_STRENGTH);
        let experience = if self.max_log_participations > 0.0 {
            (stats.participations.ln_1p() / self.max_log_participations).min(1.0)
        } else {
            0.0
        };
        let share = |count: f64| {
            if stats.participations > 0.0 {
                (count / stats.participations).clamp(0.0, 1.0)
            } else {
                0.0
            }
        };

        vec![
            log_start as f32,
            bid_ratio as f32,
            win_rate as f32,
            experience as f32,
            share(stats.region_count) as f32,
            share(stats.category_count) as f32,
            if interaction.ktru_code.is_some() { 1.0 } else { 0.0 },
        ]
    }

    pub fn rows(&self, interactions: &[Interaction]) -> Vec<Vec<f32>> {
        interactions.iter().map(|row| self.row(row)).collect()
    }

    fn supplier_stats(&self, interaction: &Interaction) -> SupplierStats {
        let Some(profile) = self.index.get(&interaction.post_num) else {
            return SupplierStats::default();
        };

        let n = profile.participations as f64;
        let mut stats = SupplierStats {
            participations: n,
            wins: profile.wins as f64,
            region_count: interaction
                .lot_region
                .as_deref()
                .map(|r| (profile.region_affinity(r) * n).round())
                .unwrap_or(0.0),
            category_count: interaction
                .okpd2_code
                .as_deref()
                .map(|c| (profile.category_affinity(c) * n).round())
                .unwrap_or(0.0),
        };

        if self.index.has_lot(&interaction.pn_lot) {
            stats.participations -= 1.0;
            if interaction.is_winner {
                stats.wins -= 1.0;
            }
            let own_region = interaction
                .supplier_region
                .as_deref()
                .or(interaction.lot_region.as_deref());
            if own_region.is_some() && own_region == interaction.lot_region.as_deref() {
                stats.region_count -= 1.0;
            }
            if interaction.okpd2_code.is_some() {
                stats.category_count -= 1.0;
            }
        }

        stats.participations = stats.participations.max(0.0);
        stats.wins = stats.wins.max(0.0);
        stats.region_count = stats.region_count.max(0.0);
        stats.category_count = stats.category_count.max(0.0);
        stats
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SupplierStats {
    participations: f64,
    wins: f64,
    region_count: f64,
    category_count: f64,
}

/// Regressor input: `log_start_price` followed by `buckets` hashed categorical slots
/// (OKPD2 class, OKPD2 two-segment prefix, full OKPD2, region).
pub fn hashed_row(interaction: &Interaction, buckets: usize) -> Vec<f32> {
    let buckets = buckets.max(1);
    let mut row = vec![0.0f32; 1 + buckets];
    row[0] = interaction.start_price.map(|p| p.ln_1p()).unwrap_or(0.0) as f32;

    if let Some(code) = interaction.okpd2_code.as_deref() {
        let segments: Vec<&str> = code.split('.').collect();
        row[1 + hash_feature("okpd2_2", segments[0], buckets)] += 1.0;
        let two = segments[..segments.len().min(2)].join(".");
        row[1 + hash_feature("okpd2_4", &two, buckets)] += 1.0;
        row[1 + hash_feature("okpd2", code, buckets)] += 1.0;
    }
    if let Some(region) = interaction.lot_region.as_deref() {
        row[1 + hash_feature("region", region, buckets)] += 1.0;
    }

    row
}

/// Per-column standardization fitted on training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl Standardizer {
    /// Fits column means and standard deviations. Constant columns get a scale of 1.
    pub fn fit(rows: &[Vec<f32>]) -> Self {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let n = rows.len().max(1) as f64;

        let mut mean = vec![0.0f64; width];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += *v as f64;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0f64; width];
        for row in rows {
            for ((s, v), m) in var.iter_mut().zip(row).zip(&mean) {
                *s += (*v as f64 - m).powi(2);
            }
        }

        let std = var
            .into_iter()
            .map(|s| {
                let sd = (s / n).sqrt();
                if sd > 1e-9 { sd as f32 } else { 1.0 }
            })
            .collect();

        Self {
            mean: mean.into_iter().map(|m| m as f32).collect(),
            std,
        }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, row: &[f32]) -> Vec<f32> {
        row.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }
}
