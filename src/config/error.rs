//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric environment variable could not be parsed.
    #[error("failed to parse {name}='{value}': {reason}")]
    ParseError {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Clip quantiles must satisfy `0 <= low < high <= 1`.
    #[error("invalid clip quantiles: low={low}, high={high} (need 0 <= low < high <= 1)")]
    InvalidQuantiles { low: f64, high: f64 },

    /// Holdout fraction must lie strictly between 0 and 1.
    #[error("invalid holdout fraction {value}: must be in (0, 1)")]
    InvalidHoldoutFraction { value: f64 },

    /// A ranking or training parameter is out of range.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    /// Path exists but is not a directory (when a directory was expected).
    #[error("path is not a directory: {path}")]
    NotADirectory { path: PathBuf },
}
