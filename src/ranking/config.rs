use crate::config::{
    ConfigError, parse_f64_from_env, parse_u32_from_env, parse_usize_from_env,
};
use crate::constants::{
    DEFAULT_COARSE_KEEP, DEFAULT_MIN_PARTICIPATIONS, DEFAULT_PRICE_BAND, DEFAULT_RECENCY_DAYS,
    DEFAULT_REFINE_THRESHOLD, DEFAULT_WEIGHT_CATEGORY, DEFAULT_WEIGHT_EXPERIENCE,
    DEFAULT_WEIGHT_PRICE, DEFAULT_WEIGHT_RECENCY, DEFAULT_WEIGHT_REGION, DEFAULT_WEIGHT_WIN_RATE,
};

/// Relative weights of the score features. Normalized to sum 1 before use.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub win_rate: f64,
    pub experience: f64,
    pub category: f64,
    pub region: f64,
    pub price: f64,
    pub recency: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            win_rate: DEFAULT_WEIGHT_WIN_RATE,
            experience: DEFAULT_WEIGHT_EXPERIENCE,
            category: DEFAULT_WEIGHT_CATEGORY,
            region: DEFAULT_WEIGHT_REGION,
            price: DEFAULT_WEIGHT_PRICE,
            recency: DEFAULT_WEIGHT_RECENCY,
        }
    }
}

impl ScoreWeights {
    fn as_array(&self) -> [f64; 6] {
        [
            self.win_rate,
            self.experience,
            self.category,
            self.region,
            self.price,
            self.recency,
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Returns the weights scaled to sum 1.
    pub fn normalized(&self) -> Self {
        let sum = self.sum();
        if sum <= 0.0 {
            return *self;
        }
        Self {
            win_rate: self.win_rate / sum,
            experience: self.experience / sum,
            category: self.category / sum,
            region: self.region / sum,
            price: self.price / sum,
            recency: self.recency / sum,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "weights",
                reason: "weights must be finite and non-negative".to_string(),
            });
        }
        if self.sum() <= 0.0 {
            return Err(ConfigError::InvalidValue {
                name: "weights",
                reason: "at least one weight must be positive".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingConfig {
    pub weights: ScoreWeights,

    /// Strict level admits suppliers whose typical lot price is within `start * (1 ± band)`.
    pub price_band: f64,

    /// Stop relaxing once this many candidates were collected. `None` means `top_k`.
    pub min_candidates: Option<usize>,

    /// Suppliers with fewer participations are never ranked.
    pub min_participations: u32,

    /// Levels admitting more candidates than this are scored in two stages.
    pub refine_threshold: usize,

    /// Survivors of the coarse stage.
    pub coarse_keep: usize,

    /// Activity within this many days of the newest activity counts as fully recent.
    pub recency_days: i64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            price_band: DEFAULT_PRICE_BAND,
            min_candidates: None,
            min_participations: DEFAULT_MIN_PARTICIPATIONS,
            refine_threshold: DEFAULT_REFINE_THRESHOLD,
            coarse_keep: DEFAULT_COARSE_KEEP,
            recency_days: DEFAULT_RECENCY_DAYS,
        }
    }
}

impl RankingConfig {
    const ENV_W_WIN_RATE: &'static str = "TENDER_RANK_W_WIN_RATE";
    const ENV_W_EXPERIENCE: &'static str = "TENDER_RANK_W_EXPERIENCE";
    const ENV_W_CATEGORY: &'static str = "TENDER_RANK_W_CATEGORY";
    const ENV_W_REGION: &'static str = "TENDER_RANK_W_REGION";
    const ENV_W_PRICE: &'static str = "TENDER_RANK_W_PRICE";
    const ENV_W_RECENCY: &'static str = "TENDER_RANK_W_RECENCY";
    const ENV_PRICE_BAND: &'static str = "TENDER_RANK_PRICE_BAND";
    const ENV_MIN_CANDIDATES: &'static str = "TENDER_RANK_MIN_CANDIDATES";
    const ENV_MIN_PARTICIPATIONS: &'static str = "TENDER_RANK_MIN_PARTICIPATIONS";
    const ENV_REFINE_THRESHOLD: &'static str = "TENDER_RANK_REFINE_THRESHOLD";
    const ENV_COARSE_KEEP: &'static str = "TENDER_RANK_COARSE_KEEP";
    const ENV_RECENCY_DAYS: &'static str = "TENDER_RANK_RECENCY_DAYS";

    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let w = defaults.weights;

        let weights = ScoreWeights {
            win_rate: parse_f64_from_env(Self::ENV_W_WIN_RATE, w.win_rate)?,
            experience: parse_f64_from_env(Self::ENV_W_EXPERIENCE, w.experience)?,
            category: parse_f64_from_env(Self::ENV_W_CATEGORY, w.category)?,
            region: parse_f64_from_env(Self::ENV_W_REGION, w.region)?,
            price: parse_f64_from_env(Self::ENV_W_PRICE, w.price)?,
            recency: parse_f64_from_env(Self::ENV_W_RECENCY, w.recency)?,
        };

        let min_candidates = match std::env::var(Self::ENV_MIN_CANDIDATES) {
            Ok(_) => Some(parse_usize_from_env(Self::ENV_MIN_CANDIDATES, 0)?),
            Err(_) => None,
        };

        let config = Self {
            weights,
            price_band: parse_f64_from_env(Self::ENV_PRICE_BAND, defaults.price_band)?,
            min_candidates,
            min_participations: parse_u32_from_env(
                Self::ENV_MIN_PARTICIPATIONS,
                defaults.min_participations,
            )?,
            refine_threshold: parse_usize_from_env(
                Self::ENV_REFINE_THRESHOLD,
                defaults.refine_threshold,
            )?,
            coarse_keep: parse_usize_from_env(Self::ENV_COARSE_KEEP, defaults.coarse_keep)?,
            recency_days: i64::from(parse_u32_from_env(
                Self::ENV_RECENCY_DAYS,
                defaults.recency_days as u32,
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_price_band(mut self, band: f64) -> Self {
        self.price_band = band;
        self
    }

    pub fn with_min_candidates(mut self, min_candidates: usize) -> Self {
        self.min_candidates = Some(min_candidates);
        self
    }

    pub fn with_refinement(mut self, refine_threshold: usize, coarse_keep: usize) -> Self {
        self.refine_threshold = refine_threshold;
        self.coarse_keep = coarse_keep;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;

        if !(self.price_band.is_finite() && self.price_band > 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "price_band",
                reason: format!("must be positive, got {}", self.price_band),
            });
        }
        if self.coarse_keep == 0 {
            return Err(ConfigError::InvalidValue {
                name: "coarse_keep",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.coarse_keep > self.refine_threshold {
            return Err(ConfigError::InvalidValue {
                name: "coarse_keep",
                reason: format!(
                    "coarse_keep ({}) exceeds refine_threshold ({})",
                    self.coarse_keep, self.refine_threshold
                ),
            });
        }
        if self.recency_days <= 0 {
            return Err(ConfigError::InvalidValue {
                name: "recency_days",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
