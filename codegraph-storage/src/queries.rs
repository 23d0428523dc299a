//! Read-side queries used by the outbox publisher and evidence tracker.
//! Writes always go through [`crate::batch`]; this module is read-only.

use codegraph_core::errors::StorageError;
use codegraph_core::model::{OutboxEvent, OutboxStatus};
use rusqlite::{params, Connection, OptionalExtension};

/// Resolve a relationship endpoint token to a POI id: `semantic_id`
/// first, then `name`, scoped to `run_id` (spec §4.6 "POI resolution").
pub fn resolve_poi(conn: &Connection, run_id: &str, token: &str) -> Result<Option<i64>, StorageError> {
    let by_semantic: Option<i64> = conn
        .query_row(
            "SELECT id FROM pois WHERE run_id = ?1 AND semantic_id = ?2 LIMIT 1",
            params![run_id, token],
            |row| row.get(0),
        )
        .optional()
        .map_err(StorageError::from_sqlite)?;
    if by_semantic.is_some() {
        return Ok(by_semantic);
    }
    conn.query_row(
        "SELECT id FROM pois WHERE run_id = ?1 AND name = ?2 LIMIT 1",
        params![run_id, token],
        |row| row.get(0),
    )
    .optional()
    .map_err(StorageError::from_sqlite)
}

/// Find a relationship's id by its unique `(source, target, type)` key,
/// used after a batched insert to recover the id assigned to a possibly
/// pre-existing row.
pub fn find_relationship_id(
    conn: &Connection,
    source_poi_id: i64,
    target_poi_id: i64,
    relationship_type: &str,
) -> Result<Option<i64>, StorageError> {
    conn.query_row(
        "SELECT id FROM relationships WHERE source_poi_id = ?1 AND target_poi_id = ?2 AND type = ?3",
        params![source_poi_id, target_poi_id, relationship_type],
        |row| row.get(0),
    )
    .optional()
    .map_err(StorageError::from_sqlite)
}

/// Look up a relationship's `run_id` and `confidence` by id (needed to
/// resolve a Class E escalation event, spec §4.6).
pub fn relationship_run_and_confidence(conn: &Connection, relationship_id: i64) -> Result<Option<(String, f64)>, StorageError> {
    conn.query_row(
        "SELECT run_id, confidence FROM relationships WHERE id = ?1",
        params![relationship_id],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
    )
    .optional()
    .map_err(StorageError::from_sqlite)
}

/// Get a file's id, inserting a `pending` row if it hasn't been seen.
/// Outside the batch writer's purview since C7 needs the id synchronously
/// to attach POIs.
pub fn get_or_create_file(conn: &Connection, file_path: &str) -> Result<i64, StorageError> {
    conn.execute(
        "INSERT INTO files (file_path, status) VALUES (?1, 'pending')
         ON CONFLICT(file_path) DO NOTHING",
        params![file_path],
    )
    .map_err(StorageError::from_sqlite)?;
    conn.query_row("SELECT id FROM files WHERE file_path = ?1", params![file_path], |row| {
        row.get(0)
    })
    .map_err(StorageError::from_sqlite)
}

/// Up to `limit` pending outbox rows ordered by id (spec §4.6 step 1).
pub fn pending_outbox_events(conn: &Connection, limit: usize) -> Result<Vec<OutboxEvent>, StorageError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT id, run_id, event_type, payload, status, created_at
             FROM outbox WHERE status = 'pending' ORDER BY id LIMIT ?1",
        )
        .map_err(StorageError::from_sqlite)?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            let payload_text: String = row.get(3)?;
            let status_text: String = row.get(4)?;
            Ok(OutboxEvent {
                id: row.get(0)?,
                run_id: row.get(1)?,
                event_type: row.get(2)?,
                payload: serde_json::from_str(&payload_text).unwrap_or(serde_json::Value::Null),
                status: parse_outbox_status(&status_text),
                created_at: row.get(5)?,
            })
        })
        .map_err(StorageError::from_sqlite)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(StorageError::from_sqlite)
}

fn parse_outbox_status(text: &str) -> OutboxStatus {
    match text {
        "published" => OutboxStatus::Published,
        "failed" => OutboxStatus::Failed,
        _ => OutboxStatus::Pending,
    }
}

/// Insert a new outbox row for a `run_id`/`event_type`/payload, outside
/// the batch writer: used by C7's downstream producers (C8's relationship
/// findings, the escalation path) to append new events synchronously.
pub fn insert_outbox_event(
    conn: &Connection,
    run_id: &str,
    event_type: &str,
    payload: &serde_json::Value,
    created_at: i64,
) -> Result<i64, StorageError> {
    conn.execute(
        "INSERT INTO outbox (run_id, event_type, payload, status, created_at) VALUES (?1, ?2, ?3, 'pending', ?4)",
        params![run_id, event_type, payload.to_string(), created_at],
    )
    .map_err(StorageError::from_sqlite)?;
    Ok(conn.last_insert_rowid())
}

/// `runReady(run_id)` (spec §4.4): no pending file-analysis events, no
/// pending intra-file relationship events, more than one file, and no
/// global-analysis event created yet for this run.
pub fn run_ready(conn: &Connection, run_id: &str) -> Result<bool, StorageError> {
    let pending_file_or_relationship: i64 = conn
        .query_row(
            "SELECT count(*) FROM outbox
             WHERE run_id = ?1 AND status = 'pending'
               AND event_type IN ('file-analysis-finding', 'relationship-analysis-finding')",
            params![run_id],
            |row| row.get(0),
        )
        .map_err(StorageError::from_sqlite)?;
    if pending_file_or_relationship > 0 {
        return Ok(false);
    }

    let file_count: i64 = conn
        .query_row(
            "SELECT count(DISTINCT file_path) FROM pois WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )
        .map_err(StorageError::from_sqlite)?;
    if file_count <= 1 {
        return Ok(false);
    }

    let existing_global: i64 = conn
        .query_row(
            "SELECT count(*) FROM outbox WHERE run_id = ?1 AND event_type = 'global-relationship-analysis-finding'",
            params![run_id],
            |row| row.get(0),
        )
        .map_err(StorageError::from_sqlite)?;
    if existing_global > 0 {
        return Ok(false);
    }

    Ok(!global_phase_triggered(conn, run_id)?)
}

pub fn global_phase_triggered(conn: &Connection, run_id: &str) -> Result<bool, StorageError> {
    let count: i64 = conn
        .query_row(
            "SELECT count(*) FROM global_phase_triggers WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )
        .map_err(StorageError::from_sqlite)?;
    Ok(count > 0)
}

pub fn mark_global_phase_triggered(conn: &Connection, run_id: &str, now: i64) -> Result<(), StorageError> {
    conn.execute(
        "INSERT OR IGNORE INTO global_phase_triggers (run_id, triggered_at) VALUES (?1, ?2)",
        params![run_id, now],
    )
    .map_err(StorageError::from_sqlite)?;
    Ok(())
}

/// Distinct directories seen for a run, derived from POI file paths —
/// one global-analysis job is enqueued per directory (spec §4.6 step 3).
pub fn distinct_directories(conn: &Connection, run_id: &str) -> Result<Vec<String>, StorageError> {
    let mut stmt = conn
        .prepare_cached("SELECT DISTINCT file_path FROM pois WHERE run_id = ?1")
        .map_err(StorageError::from_sqlite)?;
    let paths: Vec<String> = stmt
        .query_map(params![run_id], |row| row.get::<_, String>(0))
        .map_err(StorageError::from_sqlite)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StorageError::from_sqlite)?;

    let mut dirs: Vec<String> = paths
        .into_iter()
        .map(|p| {
            std::path::Path::new(&p)
                .parent()
                .map(|parent| parent.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| ".".to_string())
        })
        .collect();
    dirs.sort();
    dirs.dedup();
    Ok(dirs)
}

/// Insert a `queued` triangulation-session row for a relationship
/// being escalated (spec §4.5).
pub fn insert_triangulation_session(conn: &Connection, relationship_id: i64, run_id: &str, created_at: i64) -> Result<i64, StorageError> {
    conn.execute(
        "INSERT INTO triangulated_analysis_sessions (relationship_id, run_id, status, created_at) VALUES (?1, ?2, 'queued', ?3)",
        params![relationship_id, run_id, created_at],
    )
    .map_err(StorageError::from_sqlite)?;
    Ok(conn.last_insert_rowid())
}

pub fn evidence_counts(conn: &Connection, run_id: &str, relationship_hash: &str) -> Result<(u32, u32), StorageError> {
    conn.query_row(
        "SELECT expected_count, actual_count FROM relationship_evidence_tracking
         WHERE run_id = ?1 AND relationship_hash = ?2",
        params![run_id, relationship_hash],
        |row| Ok((row.get::<_, i64>(0)? as u32, row.get::<_, i64>(1)? as u32)),
    )
    .optional()
    .map_err(StorageError::from_sqlite)
    .map(|opt| opt.unwrap_or((0, 0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrations::run(&conn).unwrap();
        conn
    }

    #[test]
    fn resolves_poi_by_semantic_id_before_name() {
        let conn = setup();
        let file_id = get_or_create_file(&conn, "src/auth.rs").unwrap();
        conn.execute(
            "INSERT INTO pois (file_id, file_path, name, type, start_line, end_line, semantic_id, hash, run_id)
             VALUES (?1, 'src/auth.rs', 'validate', 'function', 1, 5, 'auth_func_validate', 'h1', 'run-1')",
            params![file_id],
        )
        .unwrap();
        let resolved = resolve_poi(&conn, "run-1", "auth_func_validate").unwrap();
        assert!(resolved.is_some());
        let by_name = resolve_poi(&conn, "run-1", "validate").unwrap();
        assert_eq!(resolved, by_name);
    }

    #[test]
    fn run_ready_requires_no_pending_and_multiple_files() {
        let conn = setup();
        insert_outbox_event(&conn, "run-1", "file-analysis-finding", &serde_json::json!({}), 0).unwrap();
        assert!(!run_ready(&conn, "run-1").unwrap());
    }
}
