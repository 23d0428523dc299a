//! Dedicated writer thread with a bounded crossbeam-channel. Batches
//! writes into single transactions for throughput (spec §4.1).

use std::thread::{self, JoinHandle};
use std::time::Duration;

use codegraph_core::constants::DEFAULT_MAX_RETRIES;
use codegraph_core::errors::{Classify, StorageError};
use rusqlite::Connection;

use super::commands::{
    BatchCommand, DirectoryUpsertRow, EvidenceDeltaRow, FileUpsertRow, OutboxStatusUpdateRow,
    PoiInsertRow, RelationshipInsertRow, RelationshipUpdateRow,
};

const CHANNEL_BOUND: usize = 1024;

/// Counts of rows committed per type, surfaced to operators per spec §7.
#[derive(Debug, Default, Clone)]
pub struct WriteStats {
    pub file_rows: usize,
    pub poi_rows: usize,
    pub relationship_insert_rows: usize,
    pub relationship_update_rows: usize,
    pub directory_rows: usize,
    pub evidence_rows: usize,
    pub outbox_status_rows: usize,
    pub flushes: usize,
    pub lost_commands: usize,
}

/// The writer's batching policy, threaded in from
/// [`codegraph_core::config::WriterConfig`] at construction.
#[derive(Debug, Clone, Copy)]
pub struct WriterPolicy {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for WriterPolicy {
    fn default() -> Self {
        Self {
            batch_size: codegraph_core::constants::DEFAULT_BATCH_SIZE,
            flush_interval: codegraph_core::constants::DEFAULT_FLUSH_INTERVAL,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: codegraph_core::constants::DEFAULT_RETRY_DELAY,
        }
    }
}

pub struct BatchWriter {
    tx: crossbeam_channel::Sender<BatchCommand>,
    handle: Option<JoinHandle<Result<WriteStats, StorageError>>>,
}

impl BatchWriter {
    /// Create a new batch writer with a dedicated writer thread. `conn`
    /// is moved to the writer thread and is never touched from the
    /// calling thread again.
    pub fn new(conn: Connection, policy: WriterPolicy) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(CHANNEL_BOUND);

        let handle = thread::Builder::new()
            .name("codegraph-batch-writer".to_string())
            .spawn(move || writer_loop(conn, rx, policy))
            .expect("failed to spawn batch writer thread");

        Self {
            tx,
            handle: Some(handle),
        }
    }

    pub fn send(&self, cmd: BatchCommand) -> Result<(), StorageError> {
        self.tx.send(cmd).map_err(|_| StorageError::SqliteError {
            message: "batch writer channel disconnected".to_string(),
        })
    }

    pub fn upsert_files(&self, rows: Vec<FileUpsertRow>) -> Result<(), StorageError> {
        self.send(BatchCommand::UpsertFiles(rows))
    }

    pub fn insert_pois(&self, rows: Vec<PoiInsertRow>) -> Result<(), StorageError> {
        self.send(BatchCommand::InsertPois(rows))
    }

    pub fn insert_relationships(&self, rows: Vec<RelationshipInsertRow>) -> Result<(), StorageError> {
        self.send(BatchCommand::InsertRelationships(rows))
    }

    pub fn update_relationships(&self, rows: Vec<RelationshipUpdateRow>) -> Result<(), StorageError> {
        self.send(BatchCommand::UpdateRelationships(rows))
    }

    pub fn upsert_directories(&self, rows: Vec<DirectoryUpsertRow>) -> Result<(), StorageError> {
        self.send(BatchCommand::UpsertDirectories(rows))
    }

    pub fn upsert_evidence(&self, rows: Vec<EvidenceDeltaRow>) -> Result<(), StorageError> {
        self.send(BatchCommand::UpsertEvidence(rows))
    }

    pub fn update_outbox_status(&self, rows: Vec<OutboxStatusUpdateRow>) -> Result<(), StorageError> {
        self.send(BatchCommand::UpdateOutboxStatus(rows))
    }

    /// Force all buffers; fire-and-forget.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.send(BatchCommand::Flush)
    }

    /// Force all buffers and block until the writer thread confirms the
    /// commit, so the caller can safely read what it just wrote.
    pub fn flush_sync(&self) -> Result<(), StorageError> {
        let (tx, rx) = std::sync::mpsc::sync_channel(0);
        self.send(BatchCommand::FlushSync(tx))?;
        rx.recv().map_err(|_| StorageError::SqliteError {
            message: "batch writer thread did not respond to flush_sync".to_string(),
        })
    }

    /// Stop the timer, drain buffers, then close. Returns the final
    /// stats, which include any commands lost to non-retryable errors.
    pub fn shutdown(mut self) -> Result<WriteStats, StorageError> {
        let _ = self.tx.send(BatchCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| StorageError::SqliteError {
                message: "batch writer thread panicked".to_string(),
            })?
        } else {
            Ok(WriteStats::default())
        }
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        let _ = self.tx.send(BatchCommand::Shutdown);
    }
}

fn writer_loop(
    conn: Connection,
    rx: crossbeam_channel::Receiver<BatchCommand>,
    policy: WriterPolicy,
) -> Result<WriteStats, StorageError> {
    let mut buffer: Vec<BatchCommand> = Vec::with_capacity(policy.batch_size);
    let mut stats = WriteStats::default();

    loop {
        match rx.recv_timeout(policy.flush_interval) {
            Ok(BatchCommand::Shutdown) => {
                flush_buffer(&conn, &mut buffer, &mut stats, policy);
                break;
            }
            Ok(BatchCommand::Flush) => {
                flush_buffer(&conn, &mut buffer, &mut stats, policy);
            }
            Ok(BatchCommand::FlushSync(done_tx)) => {
                flush_buffer(&conn, &mut buffer, &mut stats, policy);
                let _ = done_tx.send(());
            }
            Ok(cmd) => {
                buffer.push(cmd);
                if buffer.len() >= policy.batch_size {
                    flush_buffer(&conn, &mut buffer, &mut stats, policy);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                if !buffer.is_empty() {
                    flush_buffer(&conn, &mut buffer, &mut stats, policy);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                flush_buffer(&conn, &mut buffer, &mut stats, policy);
                break;
            }
        }
    }

    Ok(stats)
}

/// Commits the buffer in one transaction, retrying on transient errors
/// up to `policy.max_retries` with a fixed delay. A non-retryable error
/// (or retry exhaustion) drops the buffer's commands and records the
/// loss in `stats` rather than blocking the writer thread forever.
fn flush_buffer(conn: &Connection, buffer: &mut Vec<BatchCommand>, stats: &mut WriteStats, policy: WriterPolicy) {
    if buffer.is_empty() {
        return;
    }

    let mut attempt = 0;
    loop {
        match try_commit(conn, buffer) {
            Ok(batch_stats) => {
                buffer.clear();
                stats.file_rows += batch_stats.file_rows;
                stats.poi_rows += batch_stats.poi_rows;
                stats.relationship_insert_rows += batch_stats.relationship_insert_rows;
                stats.relationship_update_rows += batch_stats.relationship_update_rows;
                stats.directory_rows += batch_stats.directory_rows;
                stats.evidence_rows += batch_stats.evidence_rows;
                stats.outbox_status_rows += batch_stats.outbox_status_rows;
                stats.flushes += 1;
                return;
            }
            Err(e) if e.category().is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(attempt, error = %e, "transient storage error, retrying flush");
                thread::sleep(policy.retry_delay);
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    lost = buffer.len(),
                    "batch flush failed, dropping buffered commands"
                );
                stats.lost_commands += buffer.len();
                buffer.clear();
                return;
            }
        }
    }
}

fn try_commit(conn: &Connection, buffer: &[BatchCommand]) -> Result<WriteStats, StorageError> {
    let tx = conn.unchecked_transaction().map_err(StorageError::from_sqlite)?;
    let mut batch_stats = WriteStats::default();

    // Key invariant (spec §4.1): within one flush, files/POIs land before
    // relationships, before evidence, before outbox-status updates — so
    // any outbox row marked `published` already has its derived rows
    // durable. Directories have no ordering dependency; grouped with
    // files since both precede relationships.
    for cmd in buffer {
        if let BatchCommand::UpsertFiles(rows) = cmd {
            upsert_files(&tx, rows)?;
            batch_stats.file_rows += rows.len();
        }
    }
    for cmd in buffer {
        if let BatchCommand::UpsertDirectories(rows) = cmd {
            upsert_directories(&tx, rows)?;
            batch_stats.directory_rows += rows.len();
        }
    }
    for cmd in buffer {
        if let BatchCommand::InsertPois(rows) = cmd {
            insert_pois(&tx, rows)?;
            batch_stats.poi_rows += rows.len();
        }
    }
    for cmd in buffer {
        match cmd {
            BatchCommand::InsertRelationships(rows) => {
                insert_relationships(&tx, rows)?;
                batch_stats.relationship_insert_rows += rows.len();
            }
            BatchCommand::UpdateRelationships(rows) => {
                update_relationships(&tx, rows)?;
                batch_stats.relationship_update_rows += rows.len();
            }
            _ => {}
        }
    }
    for cmd in buffer {
        if let BatchCommand::UpsertEvidence(rows) = cmd {
            upsert_evidence(&tx, rows)?;
            batch_stats.evidence_rows += rows.len();
        }
    }
    for cmd in buffer {
        if let BatchCommand::UpdateOutboxStatus(rows) = cmd {
            update_outbox_status(&tx, rows)?;
            batch_stats.outbox_status_rows += rows.len();
        }
    }

    tx.commit().map_err(StorageError::from_sqlite)?;
    Ok(batch_stats)
}

fn upsert_files(conn: &Connection, rows: &[FileUpsertRow]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO files (file_path, status) VALUES (?1, ?2)
             ON CONFLICT(file_path) DO UPDATE SET status = excluded.status",
        )
        .map_err(StorageError::from_sqlite)?;
    for row in rows {
        let status = serde_json::to_value(row.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "pending".to_string());
        stmt.execute(rusqlite::params![row.file_path, status])
            .map_err(StorageError::from_sqlite)?;
    }
    Ok(())
}

fn upsert_directories(conn: &Connection, rows: &[DirectoryUpsertRow]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO directory_summaries (run_id, directory_path, summary_text) VALUES (?1, ?2, ?3)
             ON CONFLICT(run_id, directory_path) DO UPDATE SET summary_text = excluded.summary_text",
        )
        .map_err(StorageError::from_sqlite)?;
    for row in rows {
        stmt.execute(rusqlite::params![row.run_id, row.directory_path, row.summary_text])
            .map_err(StorageError::from_sqlite)?;
    }
    Ok(())
}

/// "Ignore on duplicate" semantics (spec §4.1): a POI hash collision
/// within a run is expected, not an error — one row survives.
fn insert_pois(conn: &Connection, rows: &[PoiInsertRow]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO pois
             (file_id, file_path, name, type, start_line, end_line, description,
              is_exported, semantic_id, hash, run_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .map_err(StorageError::from_sqlite)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.file_id,
            row.file_path,
            row.name,
            row.poi_type,
            row.start_line,
            row.end_line,
            row.description,
            row.is_exported,
            row.semantic_id,
            row.hash,
            row.run_id,
        ])
        .map_err(StorageError::from_sqlite)?;
    }
    Ok(())
}

/// "Ignore on duplicate" for (source, target, type) collisions.
fn insert_relationships(conn: &Connection, rows: &[RelationshipInsertRow]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR IGNORE INTO relationships
             (source_poi_id, target_poi_id, type, file_path, status, confidence, reason, run_id, cross_file)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .map_err(StorageError::from_sqlite)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.source_poi_id,
            row.target_poi_id,
            row.relationship_type,
            row.file_path,
            row.status,
            row.confidence,
            row.reason,
            row.run_id,
            row.cross_file,
        ])
        .map_err(StorageError::from_sqlite)?;
    }
    Ok(())
}

/// Updates are idempotent (spec §4.1): applying the same update twice
/// leaves status stable.
fn update_relationships(conn: &Connection, rows: &[RelationshipUpdateRow]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached("UPDATE relationships SET status = ?2, confidence = ?3, reason = ?4 WHERE id = ?1")
        .map_err(StorageError::from_sqlite)?;
    for row in rows {
        stmt.execute(rusqlite::params![row.id, row.status, row.confidence, row.reason])
            .map_err(StorageError::from_sqlite)?;
    }
    Ok(())
}

fn upsert_evidence(conn: &Connection, rows: &[EvidenceDeltaRow]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO relationship_evidence_tracking
             (run_id, relationship_hash, expected_count, actual_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(run_id, relationship_hash) DO UPDATE SET
               expected_count = expected_count + excluded.expected_count,
               actual_count = actual_count + excluded.actual_count,
               updated_at = excluded.updated_at",
        )
        .map_err(StorageError::from_sqlite)?;
    for row in rows {
        stmt.execute(rusqlite::params![
            row.run_id,
            row.relationship_hash,
            row.expected_delta,
            row.actual_delta,
            row.updated_at,
        ])
        .map_err(StorageError::from_sqlite)?;
    }
    Ok(())
}

/// Batched status updates (spec §4.6 step 4); monotonic pending → {published|failed}.
fn update_outbox_status(conn: &Connection, rows: &[OutboxStatusUpdateRow]) -> Result<(), StorageError> {
    let mut stmt = conn
        .prepare_cached("UPDATE outbox SET status = ?2 WHERE id = ?1 AND status = 'pending'")
        .map_err(StorageError::from_sqlite)?;
    for row in rows {
        let status = serde_json::to_value(row.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "failed".to_string());
        stmt.execute(rusqlite::params![row.id, status])
            .map_err(StorageError::from_sqlite)?;
        let _ = &row.reason;
    }
    Ok(())
}
