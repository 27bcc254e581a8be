//! Concurrency-safe SQLite ledger with dedicated writer thread and read
//! pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, Row, params};
use tokio::sync::oneshot;
use tracing::debug;

use crate::adjustment::ParameterSet;
use crate::error::Result;

use super::record::{AttemptRecord, NewAttempt, NewTendencyEvent};
use super::writer::{LedgerWriter, WriteCommand};
use super::{OutcomeStore, store_err, store_err_with};

const DEFAULT_READ_POOL_SIZE: usize = 4;

struct ReadPool {
    connections: Vec<Mutex<Connection>>,
    next: std::sync::atomic::AtomicUsize,
}

impl ReadPool {
    fn new(db_path: &Path, size: usize) -> Result<Self> {
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(|e| store_err_with("Failed to open read connection", e))?;
            connections.push(Mutex::new(conn));
        }
        Ok(Self {
            connections,
            next: std::sync::atomic::AtomicUsize::new(0),
        })
    }

    fn acquire(&self) -> parking_lot::MutexGuard<'_, Connection> {
        let idx =
            self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed) % self.connections.len();
        self.connections[idx].lock()
    }
}

struct StoreInner {
    writer_tx: Sender<WriteCommand>,
    read_pool: ReadPool,
    db_path: PathBuf,
    /// Holds the writer thread handle. Must not be dropped while the
    /// store is alive.
    #[allow(dead_code)]
    writer: LedgerWriter,
}

#[derive(Clone)]
pub struct SqliteOutcomeStore {
    inner: Arc<StoreInner>,
}

impl SqliteOutcomeStore {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_read_pool_size(db_path, DEFAULT_READ_POOL_SIZE)
    }

    pub fn with_read_pool_size(db_path: impl AsRef<Path>, pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| store_err_with("Failed to create db directory", e))?;
        }

        let writer = LedgerWriter::new(db_path.clone())?;
        let writer_tx = writer.sender();
        let read_pool = ReadPool::new(&db_path, pool_size)?;

        Ok(Self {
            inner: Arc::new(StoreInner {
                writer_tx,
                read_pool,
                db_path,
                writer,
            }),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.inner.db_path
    }

    fn map_attempt_row(row: &Row<'_>) -> rusqlite::Result<AttemptRowTuple> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
            row.get(9)?,
            row.get(10)?,
            row.get(11)?,
            row.get(12)?,
        ))
    }

    fn tuple_to_record(tuple: AttemptRowTuple) -> Result<AttemptRecord> {
        let (
            id,
            subject,
            component_type,
            attempt_number,
            parameters_json,
            generated_text,
            detector_score,
            ai_score,
            subjective_score,
            readability_score,
            readability_pass,
            success,
            created_at_str,
        ) = tuple;

        let parameters: ParameterSet = serde_json::from_str(&parameters_json)
            .map_err(|e| store_err_with("Failed to deserialize parameters", e))?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| store_err_with("Failed to parse timestamp", e))?;

        Ok(AttemptRecord {
            id,
            subject,
            component_type,
            attempt_number,
            parameters,
            generated_text,
            detector_score,
            ai_score,
            subjective_score,
            readability_score,
            readability_pass,
            success,
            created_at,
        })
    }

    fn query_attempts(
        conn: &Connection,
        sql: &str,
        bind: impl FnOnce(&mut rusqlite::Statement<'_>) -> rusqlite::Result<Vec<AttemptRowTuple>>,
    ) -> Result<Vec<AttemptRecord>> {
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| store_err_with("Failed to prepare statement", e))?;
        let rows = bind(&mut stmt).map_err(|e| store_err_with("Failed to query attempts", e))?;

        rows.into_iter().map(Self::tuple_to_record).collect()
    }
}

/// Raw attempt row from the database.
/// Fields: (id, subject, component_type, attempt_number, parameters_json,
/// generated_text, detector_score, ai_score, subjective_score,
/// readability_score, readability_pass, success, created_at)
type AttemptRowTuple = (
    i64,
    String,
    String,
    u32,
    String,
    String,
    f64,
    f64,
    Option<f64>,
    Option<f64>,
    bool,
    bool,
    String,
);

const ATTEMPT_COLUMNS: &str = "id, subject, component_type, attempt_number, parameters, \
     generated_text, detector_score, ai_score, subjective_score, readability_score, \
     readability_pass, success, created_at";

#[async_trait]
impl OutcomeStore for SqliteOutcomeStore {
    async fn append(&self, attempt: NewAttempt) -> Result<AttemptRecord> {
        let (tx, rx) = oneshot::channel();

        self.inner
            .writer_tx
            .send(WriteCommand::AppendAttempt {
                attempt: Box::new(attempt.clone()),
                response: tx,
            })
            .map_err(|_| store_err("Writer thread disconnected"))?;

        let id = rx
            .await
            .map_err(|_| store_err("Writer response channel dropped"))??;
        Ok(attempt.into_record(id))
    }

    async fn append_tendency_event(&self, event: NewTendencyEvent) -> Result<i64> {
        let (tx, rx) = oneshot::channel();

        self.inner
            .writer_tx
            .send(WriteCommand::AppendTendency {
                event: Box::new(event),
                response: tx,
            })
            .map_err(|_| store_err("Writer thread disconnected"))?;

        rx.await
            .map_err(|_| store_err("Writer response channel dropped"))?
    }

    async fn query_subject_component(
        &self,
        subject: &str,
        component_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttemptRecord>> {
        let subject = subject.to_string();
        let component_type = component_type.to_string();
        let inner = Arc::clone(&self.inner);

        let records = tokio::task::spawn_blocking(move || {
            let guard = inner.read_pool.acquire();
            let sql = format!(
                "SELECT {} FROM attempts
                   WHERE subject = ?1 AND component_type = ?2 AND created_at >= ?3
                   ORDER BY id ASC",
                ATTEMPT_COLUMNS
            );
            Self::query_attempts(&guard, &sql, |stmt| {
                stmt.query_map(
                    params![subject, component_type, since.to_rfc3339()],
                    Self::map_attempt_row,
                )?
                .collect()
            })
        })
        .await
        .map_err(|e| store_err_with("Query task failed", e))??;

        debug!(count = records.len(), "Attempts queried by pair");
        Ok(records)
    }

    async fn query_global(&self) -> Result<Vec<AttemptRecord>> {
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || {
            let guard = inner.read_pool.acquire();
            let sql = format!("SELECT {} FROM attempts ORDER BY id ASC", ATTEMPT_COLUMNS);
            Self::query_attempts(&guard, &sql, |stmt| {
                stmt.query_map([], Self::map_attempt_row)?.collect()
            })
        })
        .await
        .map_err(|e| store_err_with("Query task failed", e))?
    }

    async fn count_qualifying(&self) -> Result<u64> {
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || {
            let guard = inner.read_pool.acquire();
            guard
                .query_row(
                    "SELECT COUNT(*) FROM attempts WHERE subjective_score IS NOT NULL",
                    [],
                    |row| row.get::<_, i64>(0),
                )
                .map(|n| n as u64)
                .map_err(|e| store_err_with("Failed to count qualifying rows", e))
        })
        .await
        .map_err(|e| store_err_with("Query task failed", e))?
    }

    async fn ledger_version(&self) -> Result<u64> {
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || {
            let guard = inner.read_pool.acquire();
            guard
                .query_row("SELECT MAX(id) FROM attempts", [], |row| {
                    row.get::<_, Option<i64>>(0)
                })
                .map(|opt| opt.unwrap_or(0) as u64)
                .map_err(|e| store_err_with("Failed to read ledger version", e))
        })
        .await
        .map_err(|e| store_err_with("Query task failed", e))?
    }
}
