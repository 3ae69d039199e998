use crate::config::{
    Config, ConfigError, parse_f64_from_env, parse_u64_from_env, parse_usize_from_env,
};
use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_DIM, DEFAULT_EPOCHS, DEFAULT_HOLDOUT_FRACTION,
    DEFAULT_LEARNING_RATE, DEFAULT_NEGATIVES, DEFAULT_RESCORE_CANDIDATES, DEFAULT_SEED,
    HASH_BUCKETS,
};

/// Hyperparameters shared by every trainable model.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub batch_size: usize,
    /// Two-tower embedding width.
    pub embedding_dim: usize,
    /// Sampled non-winners per winning (lot, supplier) pair.
    pub negatives: usize,
    pub seed: u64,
    pub holdout_fraction: f64,
    /// Width of the hashed categorical block of the price regressor.
    pub hash_buckets: usize,
    /// Candidates kept by the binary prefilter of the retrieval index.
    pub rescore_candidates: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            learning_rate: DEFAULT_LEARNING_RATE,
            batch_size: DEFAULT_BATCH_SIZE,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            negatives: DEFAULT_NEGATIVES,
            seed: DEFAULT_SEED,
            holdout_fraction: DEFAULT_HOLDOUT_FRACTION,
            hash_buckets: HASH_BUCKETS,
            rescore_candidates: DEFAULT_RESCORE_CANDIDATES,
        }
    }
}

impl TrainConfig {
    const ENV_EPOCHS: &'static str = "TENDER_TRAIN_EPOCHS";
    const ENV_LEARNING_RATE: &'static str = "TENDER_TRAIN_LEARNING_RATE";
    const ENV_BATCH_SIZE: &'static str = "TENDER_TRAIN_BATCH_SIZE";
    const ENV_EMBEDDING_DIM: &'static str = "TENDER_TRAIN_EMBEDDING_DIM";
    const ENV_NEGATIVES: &'static str = "TENDER_TRAIN_NEGATIVES";
    const ENV_SEED: &'static str = "TENDER_TRAIN_SEED";
    const ENV_HOLDOUT_FRACTION: &'static str = "TENDER_TRAIN_HOLDOUT_FRACTION";
    const ENV_HASH_BUCKETS: &'static str = "TENDER_TRAIN_HASH_BUCKETS";
    const ENV_RESCORE_CANDIDATES: &'static str = "TENDER_TRAIN_RESCORE_CANDIDATES";

    /// Reads `TENDER_TRAIN_*` overrides. The holdout fraction falls back to the shared
    /// `TENDER_HOLDOUT_FRACTION` so `train` and `evaluate` split the same way by default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let shared_holdout =
            parse_f64_from_env(Config::ENV_HOLDOUT_FRACTION, defaults.holdout_fraction)?;

        let config = Self {
            epochs: parse_usize_from_env(Self::ENV_EPOCHS, defaults.epochs)?,
            learning_rate: parse_f64_from_env(Self::ENV_LEARNING_RATE, defaults.learning_rate)?,
            batch_size: parse_usize_from_env(Self::ENV_BATCH_SIZE, defaults.batch_size)?,
            embedding_dim: parse_usize_from_env(Self::ENV_EMBEDDING_DIM, defaults.embedding_dim)?,
            negatives: parse_usize_from_env(Self::ENV_NEGATIVES, defaults.negatives)?,
            seed: parse_u64_from_env(Self::ENV_SEED, defaults.seed)?,
            holdout_fraction: parse_f64_from_env(Self::ENV_HOLDOUT_FRACTION, shared_holdout)?,
            hash_buckets: parse_usize_from_env(Self::ENV_HASH_BUCKETS, defaults.hash_buckets)?,
            rescore_candidates: parse_usize_from_env(
                Self::ENV_RESCORE_CANDIDATES,
                defaults.rescore_candidates,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_embedding_dim(mut self, embedding_dim: usize) -> Self {
        self.embedding_dim = embedding_dim;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
            ("embedding_dim", self.embedding_dim),
            ("hash_buckets", self.hash_buckets),
            ("rescore_candidates", self.rescore_candidates),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name,
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ConfigError::InvalidValue {
                name: "learning_rate",
                reason: format!("must be positive, got {}", self.learning_rate),
            });
        }
        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            return Err(ConfigError::InvalidHoldoutFraction {
                value: self.holdout_fraction,
            });
        }
        Ok(())
    }
}
