//! Per-supplier aggregates.

use chrono::NaiveDate;
use rkyv::{Archive, Deserialize, Serialize};

use crate::data::Interaction;

/// A `(key, count)` pair; kept as a struct so the archived layout stays explicit.
#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone, serde::Serialize)]
pub struct CountEntry {
    pub key: String,
    pub count: u32,
}

/// Aggregated participation history of one supplier (`post_num`).
///
/// Stored as `rkyv` bytes inside the profile snapshot.
///
/// # Example
/// ```rust
/// use tender::profile::SupplierProfile;
///
/// let profile = SupplierProfile::new("7701234567");
/// assert_eq!(profile.participations, 0);
/// assert_eq!(profile.region_affinity("moscow"), 0.0);
/// ```
#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone, serde::Serialize)]
pub struct SupplierProfile {
    pub post_num: String,
    pub participations: u32,
    pub wins: u32,
    /// Supplier region counts (falls back to the lot region when the supplier's is unknown).
    pub regions: Vec<CountEntry>,
    /// Full OKPD2 code counts.
    pub categories: Vec<CountEntry>,
    /// Full KTRU code counts.
    pub ktru_codes: Vec<CountEntry>,
    pub bid_sum: f64,
    pub bid_count: u32,
    pub start_price_sum: f64,
    pub start_price_count: u32,
    pub discount_sum: f64,
    pub discount_count: u32,
    /// Most recent publish date seen, `YYYY-MM-DD`.
    pub last_activity: Option<String>,
}

impl SupplierProfile {
    pub fn new(post_num: &str) -> Self {
        Self {
            post_num: post_num.to_string(),
            participations: 0,
            wins: 0,
            regions: Vec::new(),
            categories: Vec::new(),
            ktru_codes: Vec::new(),
            bid_sum: 0.0,
            bid_count: 0,
            start_price_sum: 0.0,
            start_price_count: 0,
            discount_sum: 0.0,
            discount_count: 0,
            last_activity: None,
        }
    }

    /// Folds one interaction of this supplier into the aggregates.
    pub fn record(&mut self, interaction: &Interaction) {
        debug_assert_eq!(interaction.post_num, self.post_num);

        self.participations += 1;
        if interaction.is_winner {
            self.wins += 1;
        }

        if let Some(region) = interaction
            .supplier_region
            .as_deref()
            .or(interaction.lot_region.as_deref())
        {
            bump(&mut self.regions, region);
        }
        if let Some(code) = interaction.okpd2_code.as_deref() {
            bump(&mut self.categories, code);
        }
        if let Some(code) = interaction.ktru_code.as_deref() {
            bump(&mut self.ktru_codes, code);
        }

        if let Some(bid) = interaction.bid_price {
            self.bid_sum += bid;
            self.bid_count += 1;
        }
        if let Some(start) = interaction.start_price {
            self.start_price_sum += start;
            self.start_price_count += 1;
        }
        if let Some(discount) = interaction.discount() {
            self.discount_sum += discount;
            self.discount_count += 1;
        }

        if let Some(date) = interaction.publish_date.as_deref()
            && self.last_activity.as_deref().is_none_or(|last| date > last)
        {
            self.last_activity = Some(date.to_string());
        }
    }

    /// Win rate shrunk toward `prior` with `strength` pseudo-observations.
    pub fn win_rate_smoothed(&self, prior: f64, strength: f64) -> f64 {
        let denom = self.participations as f64 + strength;
        if denom <= 0.0 {
            return prior;
        }
        (self.wins as f64 + prior * strength) / denom
    }

    pub fn raw_win_rate(&self) -> f64 {
        if self.participations == 0 {
            0.0
        } else {
            self.wins as f64 / self.participations as f64
        }
    }

    pub fn mean_bid(&self) -> Option<f64> {
        mean(self.bid_sum, self.bid_count)
    }

    /// Mean start price of the lots this supplier entered.
    pub fn typical_lot_price(&self) -> Option<f64> {
        mean(self.start_price_sum, self.start_price_count)
    }

    pub fn mean_discount(&self) -> Option<f64> {
        mean(self.discount_sum, self.discount_count)
    }

    /// Share of participations in `region`.
    pub fn region_affinity(&self, region: &str) -> f64 {
        self.share(count_of(&self.regions, |k| k == region))
    }

    /// Share of participations whose OKPD2 code equals `code` or lies under it.
    pub fn category_affinity(&self, code: &str) -> f64 {
        self.share(count_of(&self.categories, |k| code_matches_prefix(k, code)))
    }

    /// Share of participations with exactly this KTRU code.
    pub fn ktru_affinity(&self, code: &str) -> f64 {
        self.share(count_of(&self.ktru_codes, |k| k == code))
    }

    pub fn serves_region(&self, region: &str) -> bool {
        self.regions.iter().any(|e| e.key == region)
    }

    pub fn serves_category(&self, code: &str) -> bool {
        self.categories.iter().any(|e| code_matches_prefix(&e.key, code))
    }

    pub fn serves_ktru(&self, code: &str) -> bool {
        self.ktru_codes.iter().any(|e| e.key == code)
    }

    pub fn last_activity_date(&self) -> Option<NaiveDate> {
        self.last_activity
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    }

    fn share(&self, count: u32) -> f64 {
        if self.participations == 0 {
            0.0
        } else {
            (count as f64 / self.participations as f64).min(1.0)
        }
    }
}

/// Returns `true` if `code` equals `prefix` or extends it at a dot boundary.
///
/// `26.20.11` matches `26.20` and `26`, but not `26.2`.
pub fn code_matches_prefix(code: &str, prefix: &str) -> bool {
    code == prefix
        || (code.len() > prefix.len()
            && code.starts_with(prefix)
            && code.as_bytes()[prefix.len()] == b'.')
}

fn bump(entries: &mut Vec<CountEntry>, key: &str) {
    match entries.iter_mut().find(|e| e.key == key) {
        Some(entry) => entry.count += 1,
        None => entries.push(CountEntry {
            key: key.to_string(),
            count: 1,
        }),
    }
}

fn count_of(entries: &[CountEntry], pred: impl Fn(&str) -> bool) -> u32 {
    entries
        .iter()
        .filter(|e| pred(&e.key))
        .map(|e| e.count)
        .sum()
}

fn mean(sum: f64, count: u32) -> Option<f64> {
    (count > 0).then(|| sum / count as f64)
}
