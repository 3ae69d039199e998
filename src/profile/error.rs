use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("snapshot is inconsistent: {reason}")]
    InconsistentSnapshot { reason: String },
}

pub type ProfileResult<T> = Result<T, ProfileError>;
