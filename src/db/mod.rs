pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use crate::error::{MemoryError, MemoryResult};

/// Open (or create) the database at the given path with schema and
/// migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // WAL keeps readers from blocking behind a writer
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with schema and migrations applied.
pub fn open_memory_database() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub canon_revision: Option<u32>,
    pub node_count: u64,
    pub core_node_count: u64,
    pub edge_count: u64,
    pub log_count: u64,
}

/// Run `PRAGMA integrity_check` and gather row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String =
        conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let schema_version = migrations::get_schema_version(conn)?;
    let canon_revision = migrations::get_canon_revision(conn)?;

    let count = |sql: &str| -> Result<u64> {
        let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(n as u64)
    };

    Ok(HealthReport {
        integrity_ok: integrity_details == "ok",
        integrity_details,
        schema_version,
        canon_revision,
        node_count: count("SELECT COUNT(*) FROM memory_nodes")?,
        core_node_count: count("SELECT COUNT(*) FROM memory_nodes WHERE layer = 'core'")?,
        edge_count: count("SELECT COUNT(*) FROM memory_edges")?,
        log_count: count("SELECT COUNT(*) FROM memory_log")?,
    })
}

/// Open a read-only connection to an existing database file. WAL lets it
/// read while the writer holds a transaction.
pub fn open_reader(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
    )
    .with_context(|| format!("failed to open reader on {}", path.display()))?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    Ok(conn)
}

/// Database handle shared between async callers: one writer plus a set of
/// read-only connections on the same file. Cloning shares the connections.
///
/// Writes are serialized on the writer. Reads take whichever reader is free,
/// so concurrent queries never wait on each other or on a writer. A handle
/// without readers (in-memory databases) sends reads to the writer.
#[derive(Clone)]
pub struct SharedConnection {
    writer: Arc<Mutex<Connection>>,
    readers: Arc<[Mutex<Connection>]>,
    next_reader: Arc<AtomicUsize>,
}

impl SharedConnection {
    /// Single-connection handle.
    pub fn new(conn: Connection) -> Self {
        Self {
            writer: Arc::new(Mutex::new(conn)),
            readers: Arc::from(Vec::new()),
            next_reader: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle with `reader_count` read-only connections opened on `path`.
    /// `writer` must already be open on the same file in WAL mode.
    pub fn with_readers(writer: Connection, path: impl AsRef<Path>, reader_count: usize) -> Result<Self> {
        let path = path.as_ref();
        let readers = (0..reader_count)
            .map(|_| open_reader(path).map(Mutex::new))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(path = %path.display(), readers = readers.len(), "read connections opened");
        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            readers: Arc::from(readers),
            next_reader: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    /// The writer connection. Holding its lock blocks writes, never reads
    /// on a handle with readers.
    pub fn writer(&self) -> &Mutex<Connection> {
        &self.writer
    }

    /// Run write work on the writer, on the blocking thread pool.
    pub async fn write<T, F>(&self, f: F) -> MemoryResult<T>
    where
        F: FnOnce(&mut Connection) -> MemoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || {
            let mut conn = lock_recovering(&writer);
            f(&mut conn)
        })
        .await
        .map_err(|e| MemoryError::invariant(format!("db task failed: {e}")))?
    }

    /// Run read-only work on a free reader, on the blocking thread pool.
    pub async fn read<T, F>(&self, f: F) -> MemoryResult<T>
    where
        F: FnOnce(&Connection) -> MemoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        if self.readers.is_empty() {
            return self.write(move |conn| f(conn)).await;
        }

        let readers = Arc::clone(&self.readers);
        let start = self.next_reader.fetch_add(1, AtomicOrdering::Relaxed) % readers.len();
        tokio::task::spawn_blocking(move || {
            let conn = acquire_reader(&readers, start);
            f(&conn)
        })
        .await
        .map_err(|e| MemoryError::invariant(format!("db task failed: {e}")))?
    }
}

/// First reader that is free, scanning from `start`. Waits on `start` when
/// all are busy.
fn acquire_reader(readers: &[Mutex<Connection>], start: usize) -> MutexGuard<'_, Connection> {
    for offset in 0..readers.len() {
        let reader = &readers[(start + offset) % readers.len()];
        match reader.try_lock() {
            Ok(guard) => return guard,
            Err(TryLockError::Poisoned(poisoned)) => {
                tracing::warn!("reader lock poisoned by a panicked task, recovering");
                reader.clear_poison();
                return poisoned.into_inner();
            }
            Err(TryLockError::WouldBlock) => continue,
        }
    }
    lock_recovering(&readers[start])
}

/// Lock a connection, taking it back if a previous holder panicked. Writes
/// run inside transactions that roll back on drop, so a panic mid-call
/// leaves nothing half-applied.
fn lock_recovering(db: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    db.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("db lock poisoned by a panicked task, recovering");
        db.clear_poison();
        poisoned.into_inner()
    })
}
