//! Facade combining the connection manager and the batch writer into
//! the single entry point other crates depend on.

use std::path::Path;

use codegraph_core::errors::StorageError;
use codegraph_core::model::OutboxEvent;

use crate::batch::{
    BatchWriter, DirectoryUpsertRow, EvidenceDeltaRow, FileUpsertRow, OutboxStatusUpdateRow,
    PoiInsertRow, RelationshipInsertRow, RelationshipUpdateRow, WriteStats, WriterPolicy,
};
use crate::connection::DatabaseManager;
use crate::queries;

pub struct StorageEngine {
    db: DatabaseManager,
    batch: BatchWriter,
}

impl StorageEngine {
    pub fn open(path: &Path, policy: WriterPolicy) -> Result<Self, StorageError> {
        let db = DatabaseManager::open(path)?;
        let batch_conn = db.open_batch_connection()?;
        Ok(Self {
            db,
            batch: BatchWriter::new(batch_conn, policy),
        })
    }

    pub fn open_in_memory(policy: WriterPolicy) -> Result<Self, StorageError> {
        let db = DatabaseManager::open_in_memory()?;
        let batch_conn = db.open_batch_connection()?;
        Ok(Self {
            db,
            batch: BatchWriter::new(batch_conn, policy),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db.path()
    }

    pub fn batch(&self) -> &BatchWriter {
        &self.batch
    }

    pub fn checkpoint(&self) -> Result<(), StorageError> {
        self.db.checkpoint()
    }

    pub fn flush_batch(&self) -> Result<(), StorageError> {
        self.batch.flush()
    }

    pub fn flush_batch_sync(&self) -> Result<(), StorageError> {
        self.batch.flush_sync()
    }

    pub fn shutdown(self) -> Result<WriteStats, StorageError> {
        self.batch.shutdown()
    }

    pub fn with_reader<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, StorageError>,
    {
        self.db.with_reader(f)
    }

    pub fn with_writer<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, StorageError>,
    {
        self.db.with_writer(f)
    }

    pub fn get_or_create_file(&self, file_path: &str) -> Result<i64, StorageError> {
        self.with_writer(|conn| queries::get_or_create_file(conn, file_path))
    }

    pub fn resolve_poi(&self, run_id: &str, token: &str) -> Result<Option<i64>, StorageError> {
        self.with_reader(|conn| queries::resolve_poi(conn, run_id, token))
    }

    pub fn pending_outbox_events(&self, limit: usize) -> Result<Vec<OutboxEvent>, StorageError> {
        self.with_reader(|conn| queries::pending_outbox_events(conn, limit))
    }

    pub fn insert_outbox_event(
        &self,
        run_id: &str,
        event_type: &str,
        payload: &serde_json::Value,
        created_at: i64,
    ) -> Result<i64, StorageError> {
        self.with_writer(|conn| queries::insert_outbox_event(conn, run_id, event_type, payload, created_at))
    }

    pub fn insert_triangulation_session(&self, relationship_id: i64, run_id: &str, created_at: i64) -> Result<i64, StorageError> {
        self.with_writer(|conn| queries::insert_triangulation_session(conn, relationship_id, run_id, created_at))
    }

    pub fn find_relationship_id(
        &self,
        source_poi_id: i64,
        target_poi_id: i64,
        relationship_type: &str,
    ) -> Result<Option<i64>, StorageError> {
        self.with_reader(|conn| queries::find_relationship_id(conn, source_poi_id, target_poi_id, relationship_type))
    }

    pub fn relationship_run_and_confidence(&self, relationship_id: i64) -> Result<Option<(String, f64)>, StorageError> {
        self.with_reader(|conn| queries::relationship_run_and_confidence(conn, relationship_id))
    }

    pub fn run_ready(&self, run_id: &str) -> Result<bool, StorageError> {
        self.with_reader(|conn| queries::run_ready(conn, run_id))
    }

    pub fn distinct_directories(&self, run_id: &str) -> Result<Vec<String>, StorageError> {
        self.with_reader(|conn| queries::distinct_directories(conn, run_id))
    }

    pub fn evidence_counts(&self, run_id: &str, relationship_hash: &str) -> Result<(u32, u32), StorageError> {
        self.with_reader(|conn| queries::evidence_counts(conn, run_id, relationship_hash))
    }

    pub fn mark_global_phase_triggered(&self, run_id: &str, now: i64) -> Result<(), StorageError> {
        self.with_writer(|conn| queries::mark_global_phase_triggered(conn, run_id, now))
    }

    pub fn upsert_files(&self, rows: Vec<FileUpsertRow>) -> Result<(), StorageError> {
        self.batch.upsert_files(rows)
    }

    pub fn insert_pois(&self, rows: Vec<PoiInsertRow>) -> Result<(), StorageError> {
        self.batch.insert_pois(rows)
    }

    pub fn insert_relationships(&self, rows: Vec<RelationshipInsertRow>) -> Result<(), StorageError> {
        self.batch.insert_relationships(rows)
    }

    pub fn update_relationships(&self, rows: Vec<RelationshipUpdateRow>) -> Result<(), StorageError> {
        self.batch.update_relationships(rows)
    }

    pub fn upsert_directories(&self, rows: Vec<DirectoryUpsertRow>) -> Result<(), StorageError> {
        self.batch.upsert_directories(rows)
    }

    pub fn upsert_evidence(&self, rows: Vec<EvidenceDeltaRow>) -> Result<(), StorageError> {
        self.batch.upsert_evidence(rows)
    }

    pub fn update_outbox_status(&self, rows: Vec<OutboxStatusUpdateRow>) -> Result<(), StorageError> {
        self.batch.update_outbox_status(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_and_resolves_empty() {
        let engine = StorageEngine::open_in_memory(WriterPolicy::default()).unwrap();
        assert_eq!(engine.resolve_poi("run-1", "missing").unwrap(), None);
        engine.shutdown().unwrap();
    }

    #[test]
    fn inserts_poi_and_reads_it_back() {
        let engine = StorageEngine::open_in_memory(WriterPolicy::default()).unwrap();
        let file_id = engine.get_or_create_file("src/auth.rs").unwrap();
        engine
            .insert_pois(vec![PoiInsertRow {
                file_id,
                file_path: "src/auth.rs".into(),
                name: "validate_credentials".into(),
                poi_type: "function".into(),
                start_line: 10,
                end_line: 20,
                description: None,
                is_exported: true,
                semantic_id: Some("auth_func_validate_credentials".into()),
                hash: "h1".into(),
                run_id: "run-1".into(),
            }])
            .unwrap();
        engine.flush_batch_sync().unwrap();
        let resolved = engine.resolve_poi("run-1", "auth_func_validate_credentials").unwrap();
        assert!(resolved.is_some());
    }
}
