//! Connection management: WAL mode, a write-serialized connection for
//! ad hoc writes and the batch writer's own handle, and a small pool of
//! read-only connections for concurrent queries.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use codegraph_core::errors::StorageError;
use rusqlite::{Connection, OpenFlags};

const DEFAULT_READER_POOL_SIZE: usize = 4;

/// Every `:memory:` open is its own private database, which would make
/// the batch writer's connection invisible to readers. Named, shared-cache
/// in-memory databases (one per `DatabaseManager`, counter-disambiguated so
/// concurrent tests don't collide) let every connection see the same data.
static MEMORY_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

fn memory_uri() -> String {
    let id = MEMORY_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("file:codegraph-mem-{id}?mode=memory&cache=shared")
}

#[derive(Clone)]
enum Location {
    Disk(PathBuf),
    Memory(String),
}

fn configure(conn: &Connection) -> Result<(), StorageError> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(StorageError::from_sqlite)?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .map_err(StorageError::from_sqlite)?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(StorageError::from_sqlite)?;
    Ok(())
}

fn open_at(location: &Location) -> Result<Connection, StorageError> {
    let conn = match location {
        Location::Disk(path) => Connection::open(path).map_err(StorageError::from_sqlite)?,
        Location::Memory(uri) => Connection::open_with_flags(
            uri,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(StorageError::from_sqlite)?,
    };
    configure(&conn)?;
    Ok(conn)
}

/// Owns the database location and hands out connections: one
/// write-serialized connection behind a mutex for ad hoc writes and
/// checkpoints, a small pool of reader connections for concurrent
/// queries, and fresh handles for the batch writer thread to own.
pub struct DatabaseManager {
    path: Option<PathBuf>,
    location: Location,
    writer: Mutex<Connection>,
    readers: Mutex<Vec<Connection>>,
    max_readers: usize,
}

impl DatabaseManager {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let location = Location::Disk(path.to_path_buf());
        let writer = open_at(&location)?;
        crate::migrations::run(&writer)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            location,
            writer: Mutex::new(writer),
            readers: Mutex::new(Vec::new()),
            max_readers: DEFAULT_READER_POOL_SIZE,
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let location = Location::Memory(memory_uri());
        let writer = open_at(&location)?;
        crate::migrations::run(&writer)?;
        Ok(Self {
            path: None,
            location,
            writer: Mutex::new(writer),
            readers: Mutex::new(Vec::new()),
            max_readers: DEFAULT_READER_POOL_SIZE,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` against the write-serialized connection. Used for ad hoc
    /// writes outside the batch writer (migrations, checkpoints); the
    /// batch writer owns its own connection instead of going through
    /// this one.
    pub fn with_writer<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let conn = self.writer.lock().expect("writer mutex poisoned");
        f(&conn)
    }

    /// Run `f` against a pooled read-only connection, checking one out
    /// (or opening a fresh one up to `max_readers`) and returning it to
    /// the pool afterward.
    pub fn with_reader<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError>,
    {
        let conn = {
            let mut pool = self.readers.lock().expect("reader pool poisoned");
            match pool.pop() {
                Some(conn) => conn,
                None => open_at(&self.location)?,
            }
        };
        let result = f(&conn);
        let mut pool = self.readers.lock().expect("reader pool poisoned");
        if pool.len() < self.max_readers {
            pool.push(conn);
        }
        result
    }

    /// Open a fresh connection for the batch writer thread to own
    /// exclusively. In in-memory mode this shares the same named,
    /// shared-cache database as the writer and reader connections.
    pub fn open_batch_connection(&self) -> Result<Connection, StorageError> {
        open_at(&self.location)
    }

    /// Compact the write-ahead log (spec §4.1 `checkpoint()`).
    pub fn checkpoint(&self) -> Result<(), StorageError> {
        self.with_writer(|conn| {
            conn.pragma_update(None, "wal_checkpoint", "TRUNCATE")
                .map_err(StorageError::from_sqlite)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_and_runs_migrations() {
        let db = DatabaseManager::open_in_memory().unwrap();
        db.with_reader(|conn| {
            conn.query_row("SELECT count(*) FROM files", [], |row| row.get::<_, i64>(0))
                .map_err(StorageError::from_sqlite)
        })
        .unwrap();
    }

    #[test]
    fn reader_pool_reuses_connections() {
        let db = DatabaseManager::open_in_memory().unwrap();
        for _ in 0..10 {
            db.with_reader(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map_err(StorageError::from_sqlite)
            })
            .unwrap();
        }
    }
}
