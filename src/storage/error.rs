use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("snapshot not found at {path}")]
    NotFound { path: PathBuf },

    #[error("storage directory unavailable: {path}")]
    StorageUnavailable { path: PathBuf },

    #[error("invalid snapshot name '{name}'")]
    InvalidName { name: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("snapshot at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
