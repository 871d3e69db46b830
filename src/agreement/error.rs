//! Agreement computation errors

use thiserror::Error;

/// Errors raised while setting up an agreement computation.
#[derive(Debug, Error)]
pub enum AgreementError {
    #[error("Shard size must be at least 1 row")]
    InvalidShardSize,

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// Result type for agreement operations
pub type Result<T> = std::result::Result<T, AgreementError>;
