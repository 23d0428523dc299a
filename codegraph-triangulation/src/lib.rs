//! # codegraph-triangulation
//!
//! Triangulation Dispatcher (C6, spec §4.5): given low-confidence
//! relationships, enqueues each into a prioritized re-analysis queue and
//! records a triangulation-session row. The re-analysis itself is an
//! external consumer of the `triangulated-analysis` queue.

use codegraph_core::constants::{QUEUE_TRIANGULATED_ANALYSIS, TRIANGULATION_PRIORITY_HIGH_CEIL, TRIANGULATION_PRIORITY_URGENT_CEIL};
use codegraph_core::errors::{ErrorCode, QueueError, StorageError};
use codegraph_queue::QueueBackend;
use codegraph_storage::StorageEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn classify(confidence: f64) -> Self {
        if confidence < TRIANGULATION_PRIORITY_URGENT_CEIL {
            Priority::Urgent
        } else if confidence < TRIANGULATION_PRIORITY_HIGH_CEIL {
            Priority::High
        } else {
            Priority::Normal
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TriangulationError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl ErrorCode for TriangulationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.error_code(),
            Self::Queue(e) => e.error_code(),
        }
    }
}

pub struct LowConfidenceRelationship {
    pub relationship_id: i64,
    pub run_id: String,
    pub confidence: f64,
}

pub struct TriangulationDispatcher<'a> {
    storage: &'a StorageEngine,
    queue: &'a dyn QueueBackend,
}

impl<'a> TriangulationDispatcher<'a> {
    pub fn new(storage: &'a StorageEngine, queue: &'a dyn QueueBackend) -> Self {
        Self { storage, queue }
    }

    /// Enqueue every relationship into `triangulated-analysis` with its
    /// priority class and record a `queued` session row for each.
    pub fn dispatch(&self, relationships: &[LowConfidenceRelationship], now: i64) -> Result<(), TriangulationError> {
        for rel in relationships {
            let priority = Priority::classify(rel.confidence);
            self.storage.insert_triangulation_session(rel.relationship_id, &rel.run_id, now)?;
            self.queue.enqueue(
                QUEUE_TRIANGULATED_ANALYSIS,
                priority.as_str(),
                serde_json::json!({
                    "relationshipId": rel.relationship_id,
                    "runId": rel.run_id,
                    "confidence": rel.confidence,
                    "priority": priority.as_str(),
                }),
            )?;
            tracing::info!(relationship_id = rel.relationship_id, priority = priority.as_str(), "enqueued for triangulation");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_queue::InMemoryQueue;
    use codegraph_storage::WriterPolicy;

    #[test]
    fn classifies_priority_by_confidence() {
        assert_eq!(Priority::classify(0.1), Priority::Urgent);
        assert_eq!(Priority::classify(0.3), Priority::High);
        assert_eq!(Priority::classify(0.5), Priority::Normal);
    }

    #[test]
    fn dispatch_enqueues_and_records_sessions() {
        let storage = StorageEngine::open_in_memory(WriterPolicy::default()).unwrap();
        let file_id = storage.get_or_create_file("src/auth.rs").unwrap();
        storage
            .insert_pois(vec![
                codegraph_storage::batch::PoiInsertRow {
                    file_id,
                    file_path: "src/auth.rs".into(),
                    name: "a".into(),
                    poi_type: "function".into(),
                    start_line: 1,
                    end_line: 2,
                    description: None,
                    is_exported: false,
                    semantic_id: None,
                    hash: "h1".into(),
                    run_id: "run-1".into(),
                },
                codegraph_storage::batch::PoiInsertRow {
                    file_id,
                    file_path: "src/auth.rs".into(),
                    name: "b".into(),
                    poi_type: "function".into(),
                    start_line: 3,
                    end_line: 4,
                    description: None,
                    is_exported: false,
                    semantic_id: None,
                    hash: "h2".into(),
                    run_id: "run-1".into(),
                },
            ])
            .unwrap();
        storage.flush_batch_sync().unwrap();
        let source = storage.resolve_poi("run-1", "a").unwrap().unwrap();
        let target = storage.resolve_poi("run-1", "b").unwrap().unwrap();
        storage
            .insert_relationships(vec![codegraph_storage::batch::RelationshipInsertRow {
                source_poi_id: source,
                target_poi_id: target,
                relationship_type: "calls".into(),
                file_path: "src/auth.rs".into(),
                status: "pending".into(),
                confidence: 0.1,
                reason: None,
                run_id: "run-1".into(),
                cross_file: false,
            }])
            .unwrap();
        storage.flush_batch_sync().unwrap();
        let relationship_id = storage.find_relationship_id(source, target, "calls").unwrap().unwrap();

        let queue = InMemoryQueue::new();
        let dispatcher = TriangulationDispatcher::new(&storage, &queue);
        dispatcher
            .dispatch(
                &[LowConfidenceRelationship {
                    relationship_id,
                    run_id: "run-1".into(),
                    confidence: 0.1,
                }],
                0,
            )
            .unwrap();
    }
}
