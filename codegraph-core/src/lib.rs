//! # codegraph-core
//!
//! Foundation crate for the codegraph coordination fabric.
//! Defines shared types, the error taxonomy, configuration, event payload
//! schemas, constants, and telemetry init. Every other crate in the
//! workspace depends on this.

#![allow(dead_code)]

pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod model;
pub mod telemetry;

pub use config::PipelineConfig;
pub use errors::{CoreError, ErrorCategory};
pub use model::{
    DirectorySummary, File, FileStatus, OutboxEvent, OutboxStatus, Poi, Relationship,
    RelationshipEvidenceCount, RelationshipStatus, TriangulationDecision, TriangulationSession,
    TriangulationStatus,
};
