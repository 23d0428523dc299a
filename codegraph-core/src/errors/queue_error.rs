//! Queue abstraction errors (C3).

use super::{Classify, ErrorCategory, ErrorCode};

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("enqueue to '{queue}' failed: {reason}")]
    EnqueueFailed { queue: String, reason: String },

    #[error("consume from '{queue}' failed: {reason}")]
    ConsumeFailed { queue: String, reason: String },

    #[error("queue '{0}' is not a recognized named queue")]
    UnknownQueue(String),
}

impl Classify for QueueError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::EnqueueFailed { .. } | Self::ConsumeFailed { .. } => ErrorCategory::Transient,
            Self::UnknownQueue(_) => ErrorCategory::Validation,
        }
    }
}

impl ErrorCode for QueueError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EnqueueFailed { .. } => "QUEUE_ENQUEUE_FAILED",
            Self::ConsumeFailed { .. } => "QUEUE_CONSUME_FAILED",
            Self::UnknownQueue(_) => "QUEUE_UNKNOWN_QUEUE",
        }
    }
}
