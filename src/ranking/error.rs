use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("invalid ranking configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type RankResult<T> = Result<T, RankingError>;
