//! Row types and the command enum accepted by the batch writer thread
//! (spec §4.1). Grouped per type, as the writer flushes one transaction
//! per group per tick.

use codegraph_core::model::OutboxStatus;

#[derive(Debug, Clone)]
pub struct OutboxStatusUpdateRow {
    pub id: i64,
    pub status: OutboxStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PoiInsertRow {
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

#[derive(Debug, Clone)]
pub struct RelationshipInsertRow {
    pub source_poi_id: i64,
    pub target_poi_id: i64,
    pub relationship_type: String,
    pub file_path: String,
    pub status: String,
    pub confidence: f64,
    pub reason: Option<String>,
    pub run_id: String,
    pub cross_file: bool,
}

#[derive(Debug, Clone)]
pub struct RelationshipUpdateRow {
    pub id: i64,
    pub status: String,
    pub confidence: f64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DirectoryUpsertRow {
    pub run_id: String,
    pub directory_path: String,
    pub summary_text: String,
}

/// Fans into an upsert-then-increment against
/// `relationship_evidence_tracking` (spec §4.4): C7 increments
/// `expected` on fan-out, validators increment `actual`.
#[derive(Debug, Clone)]
pub struct EvidenceDeltaRow {
    pub run_id: String,
    pub relationship_hash: String,
    pub expected_delta: i64,
    pub actual_delta: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct FileUpsertRow {
    pub file_path: String,
    pub status: codegraph_core::model::FileStatus,
}

pub enum BatchCommand {
    UpsertFiles(Vec<FileUpsertRow>),
    InsertPois(Vec<PoiInsertRow>),
    InsertRelationships(Vec<RelationshipInsertRow>),
    UpdateRelationships(Vec<RelationshipUpdateRow>),
    UpsertDirectories(Vec<DirectoryUpsertRow>),
    UpsertEvidence(Vec<EvidenceDeltaRow>),
    UpdateOutboxStatus(Vec<OutboxStatusUpdateRow>),
    Flush,
    FlushSync(std::sync::mpsc::SyncSender<()>),
    Shutdown,
}
