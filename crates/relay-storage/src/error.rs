//! Storage error type, grounded on `astrid-storage::error::StorageError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("internal storage error: {0}")]
    Internal(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
