use serde::Serialize;

use crate::data::{Interaction, normalize_okpd2, normalize_region, okpd2_from_ktru};

/// Attributes of the lot suppliers are ranked for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LotQuery {
    pub okpd2_code: Option<String>,
    pub ktru_code: Option<String>,
    pub region: Option<String>,
    pub start_price: Option<f64>,
    pub top_k: usize,
    /// Suppliers never returned (e.g. already invited).
    pub exclude: Vec<String>,
}

impl LotQuery {
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            ..Default::default()
        }
    }

    pub fn okpd2(mut self, code: &str) -> Self {
        self.okpd2_code = Some(code.to_string());
        self
    }

    pub fn ktru(mut self, code: &str) -> Self {
        self.ktru_code = Some(code.to_string());
        self
    }

    pub fn region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn start_price(mut self, price: f64) -> Self {
        self.start_price = Some(price);
        self
    }

    pub fn exclude(mut self, post_nums: Vec<String>) -> Self {
        self.exclude = post_nums;
        self
    }

    /// Builds a query from the attributes of a merged lot row.
    pub fn from_interaction(interaction: &Interaction, top_k: usize) -> Self {
        Self {
            okpd2_code: interaction.okpd2_code.clone(),
            ktru_code: interaction.ktru_code.clone(),
            region: interaction.lot_region.clone(),
            start_price: interaction.start_price,
            top_k,
            exclude: Vec::new(),
        }
    }

    /// Applies the same normalization as cleaning and derives OKPD2 from KTRU.
    pub fn normalized(&self) -> Self {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let ktru_code = clean(&self.ktru_code);
        let okpd2_code = clean(&self.okpd2_code)
            .map(|c| normalize_okpd2(&c))
            .filter(|c| !c.is_empty())
            .or_else(|| ktru_code.as_deref().and_then(okpd2_from_ktru));

        Self {
            okpd2_code,
            ktru_code,
            region: clean(&self.region).map(|r| normalize_region(&r)),
            start_price: self.start_price.filter(|p| p.is_finite() && *p > 0.0),
            top_k: self.top_k,
            exclude: self.exclude.clone(),
        }
    }
}

/// Filter set that admitted a candidate, from strictest to loosest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum RelaxationLevel {
    /// Category, region and price band.
    Strict,
    /// Category and region.
    NoPrice,
    /// Category only.
    NoRegion,
    /// OKPD2 prefix with `dropped` trailing segments removed.
    CategoryPrefix { prefix: String, dropped: usize },
    /// Any supplier with at least one win.
    Global,
}

impl RelaxationLevel {
    /// Score multiplier; looser levels rank below stricter ones.
    pub fn multiplier(&self) -> f64 {
        match self {
            RelaxationLevel::Strict => 1.0,
            RelaxationLevel::NoPrice => 0.9,
            RelaxationLevel::NoRegion => 0.8,
            RelaxationLevel::CategoryPrefix { dropped, .. } => {
                (0.75 - 0.05 * *dropped as f64).max(0.5)
            }
            RelaxationLevel::Global => 0.4,
        }
    }

    pub fn label(&self) -> String {
        match self {
            RelaxationLevel::Strict => "strict".to_string(),
            RelaxationLevel::NoPrice => "no_price".to_string(),
            RelaxationLevel::NoRegion => "no_region".to_string(),
            RelaxationLevel::CategoryPrefix { prefix, .. } => format!("prefix:{prefix}"),
            RelaxationLevel::Global => "global".to_string(),
        }
    }
}

impl std::fmt::Display for RelaxationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Feature values behind a score, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub win_rate: f64,
    pub experience: f64,
    pub category: f64,
    pub region: f64,
    pub price: f64,
    pub recency: f64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSupplier {
    pub post_num: String,
    pub score: f64,
    pub level: RelaxationLevel,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankingOutcome {
    pub candidates: Vec<RankedSupplier>,
    /// Loosest level that contributed candidates; `None` when nothing matched.
    pub level_reached: Option<RelaxationLevel>,
    pub levels_tried: usize,
    /// `true` if any level went through coarse pre-selection.
    pub refined: bool,
}

impl RankingOutcome {
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// 1-based rank of `post_num`, if present.
    pub fn position_of(&self, post_num: &str) -> Option<usize> {
        self.candidates
            .iter()
            .position(|c| c.post_num == post_num)
            .map(|p| p + 1)
    }
}
