//! Schema migrations: the bit-exact table contracts of spec §6 plus the
//! required indexes, applied idempotently with `CREATE TABLE IF NOT EXISTS`.

use codegraph_core::errors::StorageError;
use rusqlite::Connection;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_path TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS pois (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_id INTEGER NOT NULL REFERENCES files(id),
        file_path TEXT NOT NULL,
        name TEXT NOT NULL,
        type TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        description TEXT,
        is_exported INTEGER NOT NULL DEFAULT 0,
        semantic_id TEXT,
        llm_output TEXT,
        hash TEXT NOT NULL,
        run_id TEXT NOT NULL,
        UNIQUE(hash, run_id)
    )",
    "CREATE TABLE IF NOT EXISTS relationships (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_poi_id INTEGER NOT NULL REFERENCES pois(id),
        target_poi_id INTEGER NOT NULL REFERENCES pois(id),
        type TEXT NOT NULL,
        file_path TEXT NOT NULL,
        status TEXT NOT NULL,
        confidence REAL NOT NULL,
        reason TEXT,
        run_id TEXT NOT NULL,
        cross_file INTEGER NOT NULL DEFAULT 0,
        UNIQUE(source_poi_id, target_poi_id, type)
    )",
    "CREATE TABLE IF NOT EXISTS outbox (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL,
        event_type TEXT NOT NULL,
        payload TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS relationship_evidence_tracking (
        run_id TEXT NOT NULL,
        relationship_hash TEXT NOT NULL,
        expected_count INTEGER NOT NULL DEFAULT 0,
        actual_count INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL,
        UNIQUE(run_id, relationship_hash)
    )",
    "CREATE TABLE IF NOT EXISTS directory_summaries (
        run_id TEXT NOT NULL,
        directory_path TEXT NOT NULL,
        summary_text TEXT NOT NULL,
        UNIQUE(run_id, directory_path)
    )",
    "CREATE TABLE IF NOT EXISTS triangulated_analysis_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        relationship_id INTEGER NOT NULL REFERENCES relationships(id),
        run_id TEXT NOT NULL,
        status TEXT NOT NULL,
        final_decision TEXT,
        weighted_consensus REAL,
        created_at INTEGER NOT NULL
    )",
    // Internal bookkeeping, not part of the bit-exact schema contract:
    // records that the global cross-file phase has already been
    // triggered for a run, so a later poll's `runReady` check doesn't
    // re-enqueue global-analysis jobs once the triggering event itself
    // has been published and is no longer `pending`.
    "CREATE TABLE IF NOT EXISTS global_phase_triggers (
        run_id TEXT PRIMARY KEY,
        triggered_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_outbox_status ON outbox(status)",
    "CREATE INDEX IF NOT EXISTS idx_outbox_status_type ON outbox(status, event_type)",
    "CREATE INDEX IF NOT EXISTS idx_pois_run_semantic ON pois(run_id, semantic_id)",
    "CREATE INDEX IF NOT EXISTS idx_pois_run_name ON pois(run_id, name)",
    "CREATE INDEX IF NOT EXISTS idx_relationships_run_status ON relationships(run_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_relationships_confidence ON relationships(confidence) WHERE confidence > 0.5",
];

pub fn run(conn: &Connection) -> Result<(), StorageError> {
    for (version, statement) in SCHEMA.iter().enumerate() {
        conn.execute(statement, []).map_err(|e| StorageError::MigrationFailed {
            version: version as u32,
            message: e.to_string(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn runs_twice_without_error() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
    }

    #[test]
    fn creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        for table in [
            "files",
            "pois",
            "relationships",
            "outbox",
            "relationship_evidence_tracking",
            "directory_summaries",
            "triangulated_analysis_sessions",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }
}
