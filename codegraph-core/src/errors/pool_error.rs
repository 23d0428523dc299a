//! Worker pool manager errors (C4).

use super::{Classify, ErrorCategory, ErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("capacity exceeded for worker '{worker_type}' (global or per-worker cap saturated)")]
    CapacityExceeded { worker_type: String },

    #[error("slot wait for '{worker_type}' timed out after {waited_ms}ms")]
    SlotTimeout { worker_type: String, waited_ms: u64 },

    #[error("circuit breaker open for worker '{worker_type}'")]
    CircuitOpen { worker_type: String },

    #[error("worker type '{0}' is not registered")]
    UnknownWorkerType(String),

    #[error("job timed out after {0}ms")]
    JobTimeout(u64),

    #[error("pool is shutting down, no new slots are granted")]
    ShuttingDown,
}

impl Classify for PoolError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::CapacityExceeded { .. } | Self::SlotTimeout { .. } => ErrorCategory::Capacity,
            Self::CircuitOpen { .. } => ErrorCategory::Capacity,
            Self::UnknownWorkerType(_) => ErrorCategory::Validation,
            Self::JobTimeout(_) => ErrorCategory::Transient,
            Self::ShuttingDown => ErrorCategory::Terminal,
        }
    }
}

impl ErrorCode for PoolError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::CapacityExceeded { .. } => "POOL_CAPACITY_EXCEEDED",
            Self::SlotTimeout { .. } => "POOL_SLOT_TIMEOUT",
            Self::CircuitOpen { .. } => "POOL_CIRCUIT_OPEN",
            Self::UnknownWorkerType(_) => "POOL_UNKNOWN_WORKER_TYPE",
            Self::JobTimeout(_) => "POOL_JOB_TIMEOUT",
            Self::ShuttingDown => "POOL_SHUTTING_DOWN",
        }
    }
}
