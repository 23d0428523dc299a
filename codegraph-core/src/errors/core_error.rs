//! Top-level error composing the per-layer errors, used at crate
//! boundaries that touch more than one subsystem (e.g. the outbox
//! publisher, which drives storage, pool, and queue in one poll).

use super::{Classify, ErrorCategory, ErrorCode, PoolError, QueueError, StorageError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("config error: {0}")]
    Config(String),
}

impl Classify for CoreError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Storage(e) => e.category(),
            Self::Pool(e) => e.category(),
            Self::Queue(e) => e.category(),
            Self::Validation(e) => e.category(),
            Self::Config(_) => ErrorCategory::Terminal,
        }
    }
}

impl ErrorCode for CoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.error_code(),
            Self::Pool(e) => e.error_code(),
            Self::Queue(e) => e.error_code(),
            Self::Validation(e) => e.error_code(),
            Self::Config(_) => "CORE_CONFIG_ERROR",
        }
    }
}
