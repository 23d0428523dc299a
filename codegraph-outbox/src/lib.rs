//! # codegraph-outbox
//!
//! Transactional Outbox Publisher (C7, spec §4.6) — the central state
//! machine. Each poll selects pending outbox rows, partitions them by
//! event class into the ordered sequence A (file findings) → B
//! (directory findings) → C (relationship findings) → D (global
//! relationship findings) → E (confidence escalations), applies each
//! class's durable effects through the batched writer, triggers the
//! global cross-file phase once a run is ready, then marks every
//! processed row `published` or `failed`.

use std::collections::{HashMap, HashSet};

use codegraph_confidence::{score, ConfidenceLevel, EvidenceItem, Factor};
use codegraph_core::config::ConfidenceConfig;
use codegraph_core::constants::{PER_FACTOR_FLOOR, QUEUE_GLOBAL_RELATIONSHIP_ANALYSIS, QUEUE_RELATIONSHIP_RESOLUTION, QUEUE_VALIDATION};
use codegraph_core::errors::{ErrorCode, QueueError, StorageError, ValidationError};
use codegraph_core::events::{OutboxPayload, PoiFinding, RelationshipFinding};
use codegraph_core::model::{OutboxEvent, OutboxStatus, Poi, Relationship};
use codegraph_queue::QueueBackend;
use codegraph_storage::batch::{
    DirectoryUpsertRow, EvidenceDeltaRow, OutboxStatusUpdateRow, PoiInsertRow, RelationshipInsertRow, RelationshipUpdateRow,
};
use codegraph_storage::StorageEngine;
use codegraph_triangulation::{LowConfidenceRelationship, TriangulationDispatcher, TriangulationError};

#[derive(Debug, thiserror::Error)]
pub enum PublisherError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error(transparent)]
    Triangulation(#[from] TriangulationError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("escalation target relationship {0} not found")]
    MissingRelationship(i64),
}

impl ErrorCode for PublisherError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Storage(e) => e.error_code(),
            Self::Queue(e) => e.error_code(),
            Self::Triangulation(e) => e.error_code(),
            Self::Validation(e) => e.error_code(),
            Self::MissingRelationship(_) => "OUTBOX_MISSING_RELATIONSHIP",
        }
    }
}

/// Outcome counters for one poll, the counters spec §7 asks the system
/// to expose (`{pending, published, failed}`) reduced to one round.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollStats {
    pub selected: usize,
    pub published: usize,
    pub failed: usize,
    pub global_phase_jobs: usize,
}

type Outcomes = HashMap<i64, (OutboxStatus, Option<String>)>;

/// Relationship-resolution jobs fan out in batches of up to this many
/// POIs (spec §8 scenario 1: "batch of up to 5").
const RELATIONSHIP_RESOLUTION_BATCH: usize = 5;

/// Routes event types outside the closed payload set to a queue (spec
/// §4.6 "Other" class). The closed tagged union in `codegraph_core::events`
/// currently covers classes A-E exactly, so nothing lands here today;
/// a future event type would register its queue here before widening
/// the tagged union.
fn queue_for(_event_type: &str) -> Option<&'static str> {
    None
}

fn record(outcomes: &mut Outcomes, id: i64, result: Result<(), PublisherError>) {
    match result {
        Ok(()) => {
            outcomes.insert(id, (OutboxStatus::Published, None));
        }
        Err(e) => {
            tracing::warn!(id, error = %e, "outbox event failed");
            outcomes.insert(id, (OutboxStatus::Failed, Some(e.to_string())));
        }
    }
}

fn uniform_evidence(confidence: f64) -> Vec<EvidenceItem> {
    Factor::ALL.into_iter().map(|factor| EvidenceItem { factor, value: confidence }).collect()
}

fn level_label(level: ConfidenceLevel) -> &'static str {
    match level {
        ConfidenceLevel::High => "HIGH",
        ConfidenceLevel::Medium => "MEDIUM",
        ConfidenceLevel::Low => "LOW",
        ConfidenceLevel::VeryLow => "VERY_LOW",
    }
}

struct FileFindingItem {
    id: i64,
    run_id: String,
    file_path: String,
    pois: Vec<PoiFinding>,
}

struct DirFindingItem {
    id: i64,
    run_id: String,
    directory_path: String,
    summary: String,
}

struct RelFindingItem {
    id: i64,
    run_id: String,
    file_path: String,
    relationships: Vec<RelationshipFinding>,
}

struct GlobalFindingItem {
    id: i64,
    run_id: String,
    file_path: String,
    relationships: Vec<RelationshipFinding>,
}

struct EscalationItem {
    id: i64,
    relationship_id: i64,
}

pub struct Publisher<'a> {
    storage: &'a StorageEngine,
    queue: &'a dyn QueueBackend,
    confidence: ConfidenceConfig,
}

impl<'a> Publisher<'a> {
    pub fn new(storage: &'a StorageEngine, queue: &'a dyn QueueBackend, confidence: ConfidenceConfig) -> Self {
        Self { storage, queue, confidence }
    }

    /// Run exactly one poll (spec §4.6 steps 1-4). Single in-flight
    /// re-entry is the caller's responsibility — a scheduler should
    /// never invoke this concurrently with itself.
    pub fn poll_once(&self, now: i64, limit: usize) -> Result<PollStats, PublisherError> {
        let events = self.storage.pending_outbox_events(limit)?;
        let mut stats = PollStats { selected: events.len(), ..Default::default() };
        if events.is_empty() {
            return Ok(stats);
        }

        let mut class_a = Vec::new();
        let mut class_b = Vec::new();
        let mut class_c = Vec::new();
        let mut class_d = Vec::new();
        let mut class_e = Vec::new();
        let mut outcomes: Outcomes = HashMap::new();
        let mut run_ids: HashSet<String> = HashSet::new();

        for event in events {
            run_ids.insert(event.run_id.clone());
            self.partition(event, &mut class_a, &mut class_b, &mut class_c, &mut class_d, &mut class_e, &mut outcomes);
        }

        self.process_class_a(&class_a, &mut outcomes)?;
        self.process_class_b(&class_b, &mut outcomes)?;
        self.process_class_c(&class_c, &mut outcomes, now)?;
        self.process_class_d(&class_d, &mut outcomes)?;
        self.process_class_e(&class_e, &mut outcomes, now)?;

        // Settle this poll's statuses before checking readiness: run_ready
        // looks for *pending* file/relationship events, so the events this
        // poll just finished processing must no longer read as pending.
        let mut rows = Vec::with_capacity(outcomes.len());
        for (id, (status, reason)) in outcomes {
            match status {
                OutboxStatus::Published => stats.published += 1,
                OutboxStatus::Failed => stats.failed += 1,
                OutboxStatus::Pending => {}
            }
            rows.push(OutboxStatusUpdateRow { id, status, reason });
        }
        self.storage.update_outbox_status(rows)?;
        self.storage.flush_batch_sync()?;

        for run_id in &run_ids {
            if self.storage.run_ready(run_id)? {
                for directory_path in self.storage.distinct_directories(run_id)? {
                    self.queue.enqueue(
                        QUEUE_GLOBAL_RELATIONSHIP_ANALYSIS,
                        "global-relationship-analysis",
                        serde_json::json!({ "runId": run_id, "directoryPath": directory_path }),
                    )?;
                    stats.global_phase_jobs += 1;
                }
                self.storage.mark_global_phase_triggered(run_id, now)?;
            }
        }

        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn partition(
        &self,
        event: OutboxEvent,
        class_a: &mut Vec<FileFindingItem>,
        class_b: &mut Vec<DirFindingItem>,
        class_c: &mut Vec<RelFindingItem>,
        class_d: &mut Vec<GlobalFindingItem>,
        class_e: &mut Vec<EscalationItem>,
        outcomes: &mut Outcomes,
    ) {
        let id = event.id;
        match OutboxPayload::from_stored(&event.event_type, &event.payload) {
            Ok(OutboxPayload::FileAnalysisFinding { run_id, file_path, pois, .. }) => {
                class_a.push(FileFindingItem { id, run_id, file_path, pois });
            }
            Ok(OutboxPayload::DirectoryAnalysisFinding { run_id, directory_path, summary, .. }) => {
                class_b.push(DirFindingItem { id, run_id, directory_path, summary });
            }
            Ok(OutboxPayload::RelationshipAnalysisFinding { run_id, file_path, relationships, .. }) => {
                class_c.push(RelFindingItem { id, run_id, file_path, relationships });
            }
            Ok(OutboxPayload::GlobalRelationshipAnalysisFinding { run_id, file_path, relationships, .. }) => {
                class_d.push(GlobalFindingItem { id, run_id, file_path, relationships });
            }
            Ok(OutboxPayload::RelationshipConfidenceEscalation { relationship_id, .. }) => {
                class_e.push(EscalationItem { id, relationship_id });
            }
            Err(e) => {
                if let Some(queue_name) = queue_for(&event.event_type) {
                    let sent = self.queue.enqueue(queue_name, &event.event_type, event.payload.clone());
                    record(outcomes, id, sent.map_err(PublisherError::from));
                } else {
                    record(outcomes, id, Err(PublisherError::Validation(e)));
                }
            }
        }
    }

    fn process_class_a(&self, items: &[FileFindingItem], outcomes: &mut Outcomes) -> Result<(), PublisherError> {
        if items.is_empty() {
            return Ok(());
        }
        for item in items {
            let outcome = self.apply_file_finding(item);
            record(outcomes, item.id, outcome);
        }
        self.storage.flush_batch_sync()?;
        Ok(())
    }

    fn apply_file_finding(&self, item: &FileFindingItem) -> Result<(), PublisherError> {
        let file_id = self.storage.get_or_create_file(&item.file_path)?;
        let rows = item
            .pois
            .iter()
            .map(|p| PoiInsertRow {
                file_id,
                file_path: item.file_path.clone(),
                name: p.name.clone(),
                poi_type: p.poi_type.clone(),
                start_line: p.start_line,
                end_line: p.end_line,
                description: p.description.clone(),
                is_exported: p.is_exported,
                semantic_id: p.semantic_id.clone(),
                hash: Poi::compute_hash(&item.file_path, &p.name, &p.poi_type, p.start_line),
                run_id: item.run_id.clone(),
            })
            .collect();
        self.storage.insert_pois(rows)?;
        self.enqueue_relationship_resolution(item)?;
        Ok(())
    }

    /// After a file's POIs persist, fan out C8 relationship-resolution
    /// work for them, batched up to `RELATIONSHIP_RESOLUTION_BATCH` POIs
    /// per job (spec §2 data flow, §8 scenario 1).
    fn enqueue_relationship_resolution(&self, item: &FileFindingItem) -> Result<(), PublisherError> {
        for chunk in item.pois.chunks(RELATIONSHIP_RESOLUTION_BATCH) {
            let tokens: Vec<&str> = chunk.iter().map(|p| p.semantic_id.as_deref().unwrap_or(p.name.as_str())).collect();
            self.queue.enqueue(
                QUEUE_RELATIONSHIP_RESOLUTION,
                "resolve-relationships",
                serde_json::json!({
                    "runId": item.run_id,
                    "filePath": item.file_path,
                    "pois": tokens,
                }),
            )?;
        }
        Ok(())
    }

    fn process_class_b(&self, items: &[DirFindingItem], outcomes: &mut Outcomes) -> Result<(), PublisherError> {
        if items.is_empty() {
            return Ok(());
        }
        for item in items {
            let outcome = self.storage.upsert_directories(vec![DirectoryUpsertRow {
                run_id: item.run_id.clone(),
                directory_path: item.directory_path.clone(),
                summary_text: item.summary.clone(),
            }]);
            record(outcomes, item.id, outcome.map_err(PublisherError::from));
        }
        self.storage.flush_batch_sync()?;
        Ok(())
    }

    /// Class C, batched across every relationship-finding event in the
    /// poll (spec §4.6): resolve endpoints, persist, score, then either
    /// fan into validation or escalate.
    fn process_class_c(&self, items: &[RelFindingItem], outcomes: &mut Outcomes, now: i64) -> Result<(), PublisherError> {
        if items.is_empty() {
            return Ok(());
        }

        struct Pending {
            source: i64,
            target: i64,
            relationship_type: String,
            confidence: f64,
            reason: Option<String>,
            run_id: String,
            file_path: String,
            escalate_hint: bool,
        }

        let mut pending = Vec::new();
        for item in items {
            for finding in &item.relationships {
                let source = self.storage.resolve_poi(&item.run_id, &finding.from)?;
                let target = self.storage.resolve_poi(&item.run_id, &finding.to)?;
                let (source, target) = match (source, target) {
                    (Some(s), Some(t)) => (s, t),
                    _ => {
                        tracing::warn!(run_id = %item.run_id, from = %finding.from, to = %finding.to, "relationship endpoint unresolved, skipping");
                        continue;
                    }
                };
                let (relationship_type, confidence) = Relationship::normalize(&finding.relationship_type, finding.confidence);
                pending.push(Pending {
                    source,
                    target,
                    relationship_type,
                    confidence,
                    reason: finding.reason.clone(),
                    run_id: item.run_id.clone(),
                    file_path: item.file_path.clone(),
                    escalate_hint: finding.escalate.unwrap_or(false),
                });
            }
            outcomes.entry(item.id).or_insert((OutboxStatus::Published, None));
        }

        if pending.is_empty() {
            return Ok(());
        }

        let insert_rows = pending
            .iter()
            .map(|p| RelationshipInsertRow {
                source_poi_id: p.source,
                target_poi_id: p.target,
                relationship_type: p.relationship_type.clone(),
                file_path: p.file_path.clone(),
                status: "pending".to_string(),
                confidence: p.confidence,
                reason: p.reason.clone(),
                run_id: p.run_id.clone(),
                cross_file: false,
            })
            .collect();
        self.storage.insert_relationships(insert_rows)?;
        self.storage.flush_batch_sync()?;

        let floor = self.confidence.per_factor_floor.unwrap_or(PER_FACTOR_FLOOR);
        let mut updates = Vec::new();
        let mut evidence = Vec::new();

        for p in &pending {
            let Some(relationship_id) = self.storage.find_relationship_id(p.source, p.target, &p.relationship_type)? else {
                tracing::warn!(source = p.source, target = p.target, "relationship vanished after insert");
                continue;
            };
            let result = score(&uniform_evidence(p.confidence), &self.confidence.weights, &self.confidence.thresholds, floor);
            let escalate = result.escalate || p.escalate_hint;

            if escalate {
                let payload = serde_json::json!({
                    "runId": p.run_id,
                    "source": "transactional-outbox-publisher",
                    "type": "relationship-confidence-escalation",
                    "relationshipId": relationship_id,
                    "confidence": p.confidence,
                    "confidenceLevel": level_label(result.level),
                    "escalationReason": format!(
                        "confidence {:.3} below escalation threshold or per-factor floor",
                        p.confidence
                    ),
                });
                self.storage.insert_outbox_event(&p.run_id, "relationship-confidence-escalation", &payload, now)?;
            } else {
                updates.push(RelationshipUpdateRow {
                    id: relationship_id,
                    status: "validated".to_string(),
                    confidence: p.confidence,
                    reason: p.reason.clone(),
                });
                evidence.push(EvidenceDeltaRow {
                    run_id: p.run_id.clone(),
                    relationship_hash: Relationship::compute_hash(p.source, p.target, &p.relationship_type),
                    expected_delta: 1,
                    actual_delta: 0,
                    updated_at: now,
                });
                self.queue.enqueue(
                    QUEUE_VALIDATION,
                    "validate-relationship",
                    serde_json::json!({ "relationshipId": relationship_id, "runId": p.run_id, "confidence": p.confidence }),
                )?;
            }
        }

        if !updates.is_empty() {
            self.storage.update_relationships(updates)?;
        }
        if !evidence.is_empty() {
            self.storage.upsert_evidence(evidence)?;
        }
        self.storage.flush_batch_sync()?;
        Ok(())
    }

    fn process_class_d(&self, items: &[GlobalFindingItem], outcomes: &mut Outcomes) -> Result<(), PublisherError> {
        if items.is_empty() {
            return Ok(());
        }
        for item in items {
            let outcome = self.apply_global_finding(item);
            record(outcomes, item.id, outcome);
        }
        self.storage.flush_batch_sync()?;
        Ok(())
    }

    fn apply_global_finding(&self, item: &GlobalFindingItem) -> Result<(), PublisherError> {
        let mut rows = Vec::new();
        for finding in &item.relationships {
            let source = self.storage.resolve_poi(&item.run_id, &finding.from)?;
            let target = self.storage.resolve_poi(&item.run_id, &finding.to)?;
            let (source, target) = match (source, target) {
                (Some(s), Some(t)) => (s, t),
                _ => {
                    tracing::warn!(run_id = %item.run_id, from = %finding.from, to = %finding.to, "cross-file relationship endpoint unresolved, skipping");
                    continue;
                }
            };
            let (relationship_type, confidence) = Relationship::normalize(&finding.relationship_type, finding.confidence);
            rows.push(RelationshipInsertRow {
                source_poi_id: source,
                target_poi_id: target,
                relationship_type,
                file_path: item.file_path.clone(),
                status: "cross_file_validated".to_string(),
                confidence,
                reason: finding.reason.clone(),
                run_id: item.run_id.clone(),
                cross_file: true,
            });
        }
        self.storage.insert_relationships(rows)?;
        Ok(())
    }

    fn process_class_e(&self, items: &[EscalationItem], outcomes: &mut Outcomes, now: i64) -> Result<(), PublisherError> {
        if items.is_empty() {
            return Ok(());
        }
        let dispatcher = TriangulationDispatcher::new(self.storage, self.queue);
        for item in items {
            let outcome = self.apply_escalation(item, &dispatcher, now);
            record(outcomes, item.id, outcome);
        }
        Ok(())
    }

    fn apply_escalation(&self, item: &EscalationItem, dispatcher: &TriangulationDispatcher, now: i64) -> Result<(), PublisherError> {
        match self.storage.relationship_run_and_confidence(item.relationship_id)? {
            Some((run_id, confidence)) => {
                dispatcher.dispatch(&[LowConfidenceRelationship { relationship_id: item.relationship_id, run_id, confidence }], now)?;
                Ok(())
            }
            None => {
                tracing::warn!(relationship_id = item.relationship_id, "escalation target relationship not found");
                Err(PublisherError::MissingRelationship(item.relationship_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codegraph_queue::InMemoryQueue;
    use codegraph_storage::WriterPolicy;

    fn engine() -> StorageEngine {
        StorageEngine::open_in_memory(WriterPolicy::default()).unwrap()
    }

    fn seed_file_finding(storage: &StorageEngine, run_id: &str, now: i64) {
        let payload = serde_json::to_value(OutboxPayload::FileAnalysisFinding {
            run_id: run_id.to_string(),
            source: "file-analysis-worker".into(),
            file_path: "src/auth.rs".into(),
            pois: vec![
                PoiFinding {
                    name: "validate_credentials".into(),
                    poi_type: "function".into(),
                    start_line: 1,
                    end_line: 10,
                    description: None,
                    is_exported: true,
                    semantic_id: Some("auth_func_validate".into()),
                },
                PoiFinding {
                    name: "db_url".into(),
                    poi_type: "variable".into(),
                    start_line: 20,
                    end_line: 20,
                    description: None,
                    is_exported: false,
                    semantic_id: Some("auth_var_db_url".into()),
                },
            ],
        })
        .unwrap();
        storage.insert_outbox_event(run_id, "file-analysis-finding", &payload, now).unwrap();
    }

    #[test]
    fn happy_poi_to_relationship_flow() {
        let storage = engine();
        let queue = InMemoryQueue::new();
        seed_file_finding(&storage, "run-1", 0);

        let publisher = Publisher::new(&storage, &queue, ConfidenceConfig::default());
        let stats = publisher.poll_once(0, 100).unwrap();
        assert_eq!(stats.published, 1);
        assert_eq!(stats.failed, 0);

        let a = storage.resolve_poi("run-1", "auth_func_validate").unwrap();
        let b = storage.resolve_poi("run-1", "auth_var_db_url").unwrap();
        assert!(a.is_some() && b.is_some());

        assert_eq!(queue.len(codegraph_core::constants::QUEUE_RELATIONSHIP_RESOLUTION), 1);
    }

    #[test]
    fn confidence_gate_filters_and_escalates_low_confidence() {
        let storage = engine();
        let queue = InMemoryQueue::new();
        seed_file_finding(&storage, "run-1", 0);
        let publisher = Publisher::new(&storage, &queue, ConfidenceConfig::default());
        publisher.poll_once(0, 100).unwrap();

        let rel_payload = serde_json::to_value(OutboxPayload::RelationshipAnalysisFinding {
            run_id: "run-1".into(),
            source: "relationship-resolution-worker".into(),
            file_path: "src/auth.rs".into(),
            relationships: vec![
                RelationshipFinding {
                    from: "auth_func_validate".into(),
                    to: "auth_var_db_url".into(),
                    relationship_type: "reads".into(),
                    reason: Some("direct read".into()),
                    confidence: Some(0.92),
                    escalate: Some(false),
                },
                RelationshipFinding {
                    from: "auth_func_validate".into(),
                    to: "auth_var_db_url".into(),
                    relationship_type: "configures".into(),
                    reason: Some("indirect".into()),
                    confidence: Some(0.63),
                    escalate: Some(false),
                },
                RelationshipFinding {
                    from: "auth_func_validate".into(),
                    to: "auth_var_db_url".into(),
                    relationship_type: "mutates".into(),
                    reason: None,
                    confidence: Some(0.30),
                    escalate: Some(false),
                },
            ],
        })
        .unwrap();
        storage.insert_outbox_event("run-1", "relationship-analysis-finding", &rel_payload, 1).unwrap();

        let stats = publisher.poll_once(1, 100).unwrap();
        assert_eq!(stats.published, 1);

        let escalations = storage
            .with_reader(|conn| {
                conn.query_row(
                    "SELECT count(*) FROM outbox WHERE event_type = 'relationship-confidence-escalation'",
                    [],
                    |row| row.get::<_, i64>(0),
                )
                .map_err(StorageError::from_sqlite)
            })
            .unwrap();
        assert_eq!(escalations, 1);

        let validated: i64 = storage
            .with_reader(|conn| {
                conn.query_row("SELECT count(*) FROM relationships WHERE status = 'validated'", [], |row| row.get(0))
                    .map_err(StorageError::from_sqlite)
            })
            .unwrap();
        assert_eq!(validated, 2);
    }

    #[test]
    fn event_class_ordering_resolves_same_poll_relationship() {
        let storage = engine();
        let queue = InMemoryQueue::new();

        let file_payload = serde_json::to_value(OutboxPayload::FileAnalysisFinding {
            run_id: "run-1".into(),
            source: "file-analysis-worker".into(),
            file_path: "src/auth.rs".into(),
            pois: vec![
                PoiFinding {
                    name: "validate_credentials".into(),
                    poi_type: "function".into(),
                    start_line: 1,
                    end_line: 10,
                    description: None,
                    is_exported: true,
                    semantic_id: Some("auth_func_validate".into()),
                },
                PoiFinding {
                    name: "db_url".into(),
                    poi_type: "variable".into(),
                    start_line: 20,
                    end_line: 20,
                    description: None,
                    is_exported: false,
                    semantic_id: Some("auth_var_db_url".into()),
                },
            ],
        })
        .unwrap();
        storage.insert_outbox_event("run-1", "file-analysis-finding", &file_payload, 0).unwrap();

        let rel_payload = serde_json::to_value(OutboxPayload::RelationshipAnalysisFinding {
            run_id: "run-1".into(),
            source: "relationship-resolution-worker".into(),
            file_path: "src/auth.rs".into(),
            relationships: vec![RelationshipFinding {
                from: "auth_func_validate".into(),
                to: "auth_var_db_url".into(),
                relationship_type: "reads".into(),
                reason: Some("same poll".into()),
                confidence: Some(0.9),
                escalate: Some(false),
            }],
        })
        .unwrap();
        storage.insert_outbox_event("run-1", "relationship-analysis-finding", &rel_payload, 0).unwrap();

        let publisher = Publisher::new(&storage, &queue, ConfidenceConfig::default());
        let stats = publisher.poll_once(0, 100).unwrap();
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.published, 2);

        let count: i64 = storage
            .with_reader(|conn| conn.query_row("SELECT count(*) FROM relationships", [], |row| row.get(0)).map_err(StorageError::from_sqlite))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn global_phase_triggers_once_per_run() {
        let storage = engine();
        let queue = InMemoryQueue::new();
        seed_file_finding(&storage, "run-1", 0);

        let second_file = serde_json::to_value(OutboxPayload::FileAnalysisFinding {
            run_id: "run-1".into(),
            source: "file-analysis-worker".into(),
            file_path: "lib/handler.rs".into(),
            pois: vec![PoiFinding {
                name: "handle_request".into(),
                poi_type: "function".into(),
                start_line: 1,
                end_line: 5,
                description: None,
                is_exported: true,
                semantic_id: Some("handler_func_handle_request".into()),
            }],
        })
        .unwrap();
        storage.insert_outbox_event("run-1", "file-analysis-finding", &second_file, 0).unwrap();

        let publisher = Publisher::new(&storage, &queue, ConfidenceConfig::default());
        let first = publisher.poll_once(0, 100).unwrap();
        assert_eq!(first.global_phase_jobs, 2);

        let second = publisher.poll_once(1, 100).unwrap();
        assert_eq!(second.global_phase_jobs, 0);
    }
}
