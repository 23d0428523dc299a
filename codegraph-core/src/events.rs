//! Closed set of outbox payload variants (spec §9 "Dynamic object
//! payloads" redesign note). Deserializing an unknown `type` is an
//! error, not silently accepted.

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoiFinding {
    pub name: String,
    #[serde(rename = "type")]
    pub poi_type: String,
    pub start_line: u32,
    pub end_line: u32,
    pub description: Option<String>,
    #[serde(default)]
    pub is_exported: bool,
    pub semantic_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipFinding {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub reason: Option<String>,
    pub confidence: Option<f64>,
    /// Set by C8's own confidence pass (spec §4.7 step 6) so C7 can
    /// enqueue a Class E escalation once the relationship has a real id.
    #[serde(default)]
    pub escalate: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "eventType", rename_all = "kebab-case")]
pub enum OutboxPayload {
    FileAnalysisFinding {
        run_id: String,
        source: String,
        file_path: String,
        pois: Vec<PoiFinding>,
    },
    DirectoryAnalysisFinding {
        run_id: String,
        source: String,
        directory_path: String,
        summary: String,
    },
    RelationshipAnalysisFinding {
        run_id: String,
        source: String,
        file_path: String,
        relationships: Vec<RelationshipFinding>,
    },
    GlobalRelationshipAnalysisFinding {
        run_id: String,
        source: String,
        file_path: String,
        from_file: String,
        to_file: String,
        relationships: Vec<RelationshipFinding>,
    },
    RelationshipConfidenceEscalation {
        run_id: String,
        source: String,
        relationship_id: i64,
        confidence: f64,
        confidence_level: String,
        escalation_reason: String,
    },
}

impl OutboxPayload {
    /// The `event_type` string stored alongside the JSON payload in the
    /// outbox table (spec §3/§6).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::FileAnalysisFinding { .. } => "file-analysis-finding",
            Self::DirectoryAnalysisFinding { .. } => "directory-analysis-finding",
            Self::RelationshipAnalysisFinding { .. } => "relationship-analysis-finding",
            Self::GlobalRelationshipAnalysisFinding { .. } => {
                "global-relationship-analysis-finding"
            }
            Self::RelationshipConfidenceEscalation { .. } => "relationship-confidence-escalation",
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            Self::FileAnalysisFinding { run_id, .. }
            | Self::DirectoryAnalysisFinding { run_id, .. }
            | Self::RelationshipAnalysisFinding { run_id, .. }
            | Self::GlobalRelationshipAnalysisFinding { run_id, .. }
            | Self::RelationshipConfidenceEscalation { run_id, .. } => run_id,
        }
    }

    /// Parse a stored `(event_type, payload)` pair back into a typed
    /// variant, rejecting anything not in the closed set.
    pub fn from_stored(event_type: &str, payload: &serde_json::Value) -> Result<Self, ValidationError> {
        let mut tagged = payload.clone();
        if let Some(obj) = tagged.as_object_mut() {
            obj.insert(
                "eventType".to_string(),
                serde_json::Value::String(event_type.to_string()),
            );
        }
        serde_json::from_value(tagged).map_err(|_| ValidationError::UnknownEventType(event_type.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_relationship_finding() {
        let payload = OutboxPayload::RelationshipAnalysisFinding {
            run_id: "run-1".into(),
            source: "relationship-resolution-worker".into(),
            file_path: "src/auth.rs".into(),
            relationships: vec![RelationshipFinding {
                from: "auth_func_validate".into(),
                to: "auth_var_db_url".into(),
                relationship_type: "reads".into(),
                reason: Some("queries the connection string".into()),
                confidence: Some(0.9),
                escalate: Some(false),
            }],
        };
        let value = serde_json::to_value(&payload).unwrap();
        let event_type = payload.event_type();
        let parsed = OutboxPayload::from_stored(event_type, &value).unwrap();
        assert_eq!(parsed.run_id(), "run-1");
    }

    #[test]
    fn rejects_unknown_event_type() {
        let value = serde_json::json!({"run_id": "run-1", "source": "x"});
        let err = OutboxPayload::from_stored("totally-unknown-kind", &value).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownEventType(_)));
    }
}
