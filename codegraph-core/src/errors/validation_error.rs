//! Validation and resolution errors: bad input is skipped, never fatal.

use super::{Classify, ErrorCategory, ErrorCode};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("confidence {0} is out of range [0,1]")]
    ConfidenceOutOfRange(f64),

    #[error("unknown POI type '{0}'")]
    UnknownPoiType(String),

    #[error("relationship type must not be empty")]
    EmptyRelationshipType,

    #[error("POI endpoint '{token}' did not resolve to any POI in run '{run_id}'")]
    UnresolvedPoi { token: String, run_id: String },

    #[error("unknown outbox event type '{0}'")]
    UnknownEventType(String),
}

impl Classify for ValidationError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::UnresolvedPoi { .. } => ErrorCategory::Resolution,
            _ => ErrorCategory::Validation,
        }
    }
}

impl ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "VALIDATION_MISSING_FIELD",
            Self::ConfidenceOutOfRange(_) => "VALIDATION_CONFIDENCE_OUT_OF_RANGE",
            Self::UnknownPoiType(_) => "VALIDATION_UNKNOWN_POI_TYPE",
            Self::EmptyRelationshipType => "VALIDATION_EMPTY_RELATIONSHIP_TYPE",
            Self::UnresolvedPoi { .. } => "VALIDATION_UNRESOLVED_POI",
            Self::UnknownEventType(_) => "VALIDATION_UNKNOWN_EVENT_TYPE",
        }
    }
}
