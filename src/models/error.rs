use std::path::PathBuf;
use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("training set is empty: {what}")]
    EmptyTrainingSet { what: &'static str },

    #[error("feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model artifact not found at path: {path}")]
    ArtifactNotFound { path: PathBuf },

    #[error("tensor operation failed: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to read or write model metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;
