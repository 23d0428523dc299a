//! Data model entities (spec §3): File, POI, Relationship, Outbox Event,
//! Relationship Evidence Count, Triangulation Session, Directory Summary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Processed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    pub id: i64,
    pub path: String,
    pub status: FileStatus,
}

/// A Point of Interest: a named code entity extracted by an (external)
/// file-analysis worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poi {
    pub id: i64,
    pub file_id: i64,
    pub file_path: String,
    pub name: String,
    pub poi_type: String,
    pub start_line: u32,
    pub end_line: u32,
    pub description: Option<String>,
    pub is_exported: bool,
    pub semantic_id: Option<String>,
    pub hash: String,
    pub run_id: String,
}

impl Poi {
    /// `hash = digest(file_path, name, type, start_line)`, unique within `run_id`.
    pub fn compute_hash(file_path: &str, name: &str, poi_type: &str, start_line: u32) -> String {
        let mut buf = Vec::with_capacity(file_path.len() + name.len() + poi_type.len() + 12);
        buf.extend_from_slice(file_path.as_bytes());
        buf.push(0);
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
        buf.extend_from_slice(poi_type.as_bytes());
        buf.push(0);
        buf.extend_from_slice(&start_line.to_le_bytes());
        format!("{:016x}", xxhash_rust::xxh3::xxh3_64(&buf))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStatus {
    Pending,
    Validated,
    CrossFileValidated,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub id: i64,
    pub source_poi_id: i64,
    pub target_poi_id: i64,
    pub relationship_type: String,
    pub file_path: String,
    pub status: RelationshipStatus,
    pub confidence: f64,
    pub reason: Option<String>,
    pub run_id: String,
    pub cross_file: bool,
}

/// Default confidence applied when the LLM omitted one (spec §3).
pub const DEFAULT_RELATIONSHIP_CONFIDENCE: f64 = 0.8;

impl Relationship {
    /// `relationship_hash = digest(from, to, type)`.
    pub fn compute_hash(source_poi_id: i64, target_poi_id: i64, relationship_type: &str) -> String {
        let mut buf = Vec::with_capacity(relationship_type.len() + 17);
        buf.extend_from_slice(&source_poi_id.to_le_bytes());
        buf.extend_from_slice(&target_poi_id.to_le_bytes());
        buf.push(0);
        buf.extend_from_slice(relationship_type.as_bytes());
        format!("{:016x}", xxhash_rust::xxh3::xxh3_64(&buf))
    }

    /// Clamp confidence to [0,1] and upper-case the type, per the
    /// "confidence clamp" invariant (spec §8).
    pub fn normalize(relationship_type: &str, confidence: Option<f64>) -> (String, f64) {
        let normalized_type = relationship_type.trim().to_uppercase();
        let confidence = confidence.unwrap_or(DEFAULT_RELATIONSHIP_CONFIDENCE).clamp(0.0, 1.0);
        (normalized_type, confidence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    Pending,
    Published,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub run_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelationshipEvidenceCount {
    pub run_id: String,
    pub relationship_hash: String,
    pub expected_count: u32,
    pub actual_count: u32,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriangulationStatus {
    Queued,
    Running,
    Decided,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriangulationDecision {
    Accept,
    Reject,
    Defer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangulationSession {
    pub id: i64,
    pub relationship_id: i64,
    pub run_id: String,
    pub status: TriangulationStatus,
    pub final_decision: Option<TriangulationDecision>,
    pub weighted_consensus: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySummary {
    pub run_id: String,
    pub directory_path: String,
    pub summary_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poi_hash_is_stable() {
        let a = Poi::compute_hash("src/auth.rs", "validate_credentials", "function", 10);
        let b = Poi::compute_hash("src/auth.rs", "validate_credentials", "function", 10);
        assert_eq!(a, b);
    }

    #[test]
    fn poi_hash_changes_with_line() {
        let a = Poi::compute_hash("src/auth.rs", "validate_credentials", "function", 10);
        let b = Poi::compute_hash("src/auth.rs", "validate_credentials", "function", 11);
        assert_ne!(a, b);
    }

    #[test]
    fn normalize_clamps_and_upcases() {
        let (t, c) = Relationship::normalize("calls", Some(1.5));
        assert_eq!(t, "CALLS");
        assert_eq!(c, 1.0);

        let (_, c) = Relationship::normalize("calls", Some(-0.5));
        assert_eq!(c, 0.0);

        let (_, c) = Relationship::normalize("calls", None);
        assert_eq!(c, DEFAULT_RELATIONSHIP_CONFIDENCE);
    }
}
