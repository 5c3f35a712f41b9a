use thiserror::Error;

use crate::storage::StorageError;

/// Unified application error.
///
/// Config, persistence, and server start-up failures all surface through
/// this type so `main` can log them and exit with a non-zero status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
