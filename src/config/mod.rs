//! Environment-backed configuration.
//!
//! Most settings have defaults. Override with `TENDER_*` environment variables.
//! Ranking and training parameters live next to the code that uses them
//! ([`RankingConfig`](crate::ranking::RankingConfig), [`TrainConfig`](crate::models::TrainConfig))
//! and reuse the parsing helpers in this module.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_CLIP_HIGH, DEFAULT_CLIP_LOW, DEFAULT_HOLDOUT_FRACTION, DEFAULT_SENTINELS,
};

/// Pipeline configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `TENDER_*` overrides on top of defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding the raw CSV exports. Default: `./data`.
    pub data_dir: PathBuf,

    /// Directory for snapshots, model weights and reports. Default: `./artifacts`.
    pub artifacts_dir: PathBuf,

    /// Lower price quantile for outlier clipping. Default: `0.01`.
    pub clip_low: f64,

    /// Upper price quantile for outlier clipping. Default: `0.99`.
    pub clip_high: f64,

    /// Field values treated as missing.
    pub sentinels: Vec<String>,

    /// Share of lots held out for evaluation. Default: `0.2`.
    pub holdout_fraction: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            artifacts_dir: PathBuf::from("./artifacts"),
            clip_low: DEFAULT_CLIP_LOW,
            clip_high: DEFAULT_CLIP_HIGH,
            sentinels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
            holdout_fraction: DEFAULT_HOLDOUT_FRACTION,
        }
    }
}

impl Config {
    const ENV_DATA_DIR: &'static str = "TENDER_DATA_DIR";
    const ENV_ARTIFACTS_DIR: &'static str = "TENDER_ARTIFACTS_DIR";
    const ENV_CLIP_LOW: &'static str = "TENDER_CLIP_LOW";
    const ENV_CLIP_HIGH: &'static str = "TENDER_CLIP_HIGH";
    const ENV_SENTINELS: &'static str = "TENDER_SENTINELS";
    pub(crate) const ENV_HOLDOUT_FRACTION: &'static str = "TENDER_HOLDOUT_FRACTION";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let data_dir = parse_path_from_env(Self::ENV_DATA_DIR, defaults.data_dir);
        let artifacts_dir = parse_path_from_env(Self::ENV_ARTIFACTS_DIR, defaults.artifacts_dir);
        let clip_low = parse_f64_from_env(Self::ENV_CLIP_LOW, defaults.clip_low)?;
        let clip_high = parse_f64_from_env(Self::ENV_CLIP_HIGH, defaults.clip_high)?;
        let sentinels = Self::parse_sentinels_from_env(defaults.sentinels);
        let holdout_fraction =
            parse_f64_from_env(Self::ENV_HOLDOUT_FRACTION, defaults.holdout_fraction)?;

        Ok(Self {
            data_dir,
            artifacts_dir,
            clip_low,
            clip_high,
            sentinels,
            holdout_fraction,
        })
    }

    /// Validates ranges and paths (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let quantiles_ok = (0.0..=1.0).contains(&self.clip_low)
            && (0.0..=1.0).contains(&self.clip_high)
            && self.clip_low < self.clip_high;
        if !quantiles_ok {
            return Err(ConfigError::InvalidQuantiles {
                low: self.clip_low,
                high: self.clip_high,
            });
        }

        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            return Err(ConfigError::InvalidHoldoutFraction {
                value: self.holdout_fraction,
            });
        }

        if self.artifacts_dir.exists() && !self.artifacts_dir.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.artifacts_dir.clone(),
            });
        }

        Ok(())
    }

    /// Resolves a bare file name against [`Config::data_dir`]; paths with a directory
    /// component (or absolute paths) are returned unchanged.
    pub fn data_file(&self, name: impl AsRef<Path>) -> PathBuf {
        let candidate = name.as_ref().to_path_buf();
        if candidate.components().count() > 1 || candidate.is_absolute() {
            candidate
        } else {
            self.data_dir.join(candidate)
        }
    }

    fn parse_sentinels_from_env(default: Vec<String>) -> Vec<String> {
        match env::var(Self::ENV_SENTINELS) {
            Ok(value) => value.split(',').map(|s| s.trim().to_string()).collect(),
            Err(_) => default,
        }
    }
}

pub(crate) fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
    env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

pub(crate) fn parse_f64_from_env(var_name: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse::<f64>()
            .map_err(|e| ConfigError::ParseError {
                name: var_name,
                value: value.clone(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_usize_from_env(
    var_name: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse::<usize>()
            .map_err(|e| ConfigError::ParseError {
                name: var_name,
                value: value.clone(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_u64_from_env(var_name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::ParseError {
                name: var_name,
                value: value.clone(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

/// Values above `u32::MAX` are rejected rather than truncated.
pub(crate) fn parse_u32_from_env(var_name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value
            .trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::ParseError {
                name: var_name,
                value: value.clone(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}
