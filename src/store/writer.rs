//! Dedicated writer thread for the SQLite ledger. One transaction per
//! append, so concurrent writers never interleave partial records.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use rusqlite::{Connection, params};
use tracing::{debug, error, warn};

use crate::error::Result;

use super::record::{NewAttempt, NewTendencyEvent};
use super::{store_err, store_err_with};

pub(super) enum WriteCommand {
    AppendAttempt {
        attempt: Box<NewAttempt>,
        response: tokio::sync::oneshot::Sender<Result<i64>>,
    },
    AppendTendency {
        event: Box<NewTendencyEvent>,
        response: tokio::sync::oneshot::Sender<Result<i64>>,
    },
    Shutdown,
}

pub(super) struct LedgerWriter {
    tx: Sender<WriteCommand>,
    handle: Option<JoinHandle<()>>,
}

impl LedgerWriter {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<WriteCommand>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

        let handle = thread::Builder::new()
            .name("ledger-writer".into())
            .spawn(move || match Self::init_db(&db_path) {
                Ok(conn) => {
                    let _ = ready_tx.send(Ok(()));
                    Self::process_commands(&conn, rx);
                }
                Err(e) => {
                    error!(error = %e, "Ledger writer init failed");
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| store_err_with("Failed to spawn writer thread", e))?;

        ready_rx
            .recv()
            .map_err(|_| store_err("Writer thread died during init"))??;

        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    pub fn sender(&self) -> Sender<WriteCommand> {
        self.tx.clone()
    }

    fn init_db(db_path: &PathBuf) -> Result<Connection> {
        let conn =
            Connection::open(db_path).map_err(|e| store_err_with("Failed to open database", e))?;
        Self::init_schema(&conn)?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS attempts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                component_type TEXT NOT NULL,
                attempt_number INTEGER NOT NULL,
                parameters TEXT NOT NULL,
                generated_text TEXT NOT NULL,
                detector_score REAL NOT NULL,
                ai_score REAL NOT NULL,
                subjective_score REAL,
                readability_score REAL,
                readability_pass INTEGER NOT NULL,
                success INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_attempts_pair
                ON attempts(subject, component_type, created_at);
            CREATE INDEX IF NOT EXISTS idx_attempts_created
                ON attempts(created_at);

            CREATE TABLE IF NOT EXISTS tendency_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                tendencies TEXT NOT NULL,
                adjustments TEXT NOT NULL,
                success INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_tendency_subject
                ON tendency_events(subject, created_at);
            ",
        )
        .map_err(|e| store_err_with("Failed to init schema", e))?;
        Ok(())
    }

    fn process_commands(conn: &Connection, rx: Receiver<WriteCommand>) {
        for cmd in rx {
            match cmd {
                WriteCommand::AppendAttempt { attempt, response } => {
                    let result = Self::append_attempt(conn, &attempt);
                    let _ = response.send(result);
                }
                WriteCommand::AppendTendency { event, response } => {
                    let result = Self::append_tendency(conn, &event);
                    let _ = response.send(result);
                }
                WriteCommand::Shutdown => {
                    debug!("Ledger writer received shutdown signal");
                    break;
                }
            }
        }
    }

    fn append_attempt(conn: &Connection, attempt: &NewAttempt) -> Result<i64> {
        let parameters = serde_json::to_string(&attempt.parameters)
            .map_err(|e| store_err_with("Failed to serialize parameters", e))?;

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| store_err_with("Failed to start transaction", e))?;

        tx.execute(
            "INSERT INTO attempts (subject, component_type, attempt_number, parameters,
                                   generated_text, detector_score, ai_score, subjective_score,
                                   readability_score, readability_pass, success, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                &attempt.subject,
                &attempt.component_type,
                attempt.attempt_number,
                parameters,
                &attempt.generated_text,
                attempt.detector_score,
                attempt.ai_score,
                attempt.subjective_score,
                attempt.readability_score,
                attempt.readability_pass,
                attempt.success,
                attempt.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| store_err_with("Failed to insert attempt", e))?;

        let id = tx.last_insert_rowid();
        tx.commit()
            .map_err(|e| store_err_with("Failed to commit", e))?;

        debug!(
            id,
            subject = %attempt.subject,
            attempt_number = attempt.attempt_number,
            success = attempt.success,
            "Attempt appended"
        );
        Ok(id)
    }

    fn append_tendency(conn: &Connection, event: &NewTendencyEvent) -> Result<i64> {
        let tendencies = serde_json::to_string(&event.tendencies)
            .map_err(|e| store_err_with("Failed to serialize tendencies", e))?;
        let adjustments = serde_json::to_string(&event.adjustments)
            .map_err(|e| store_err_with("Failed to serialize adjustments", e))?;

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| store_err_with("Failed to start transaction", e))?;

        tx.execute(
            "INSERT INTO tendency_events (subject, tendencies, adjustments, success, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &event.subject,
                tendencies,
                adjustments,
                event.success,
                event.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| store_err_with("Failed to insert tendency event", e))?;

        let id = tx.last_insert_rowid();
        tx.commit()
            .map_err(|e| store_err_with("Failed to commit", e))?;

        debug!(id, subject = %event.subject, "Tendency event appended");
        Ok(id)
    }
}

impl Drop for LedgerWriter {
    fn drop(&mut self) {
        let _ = self.tx.send(WriteCommand::Shutdown);
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.join()
        {
            warn!("Writer thread panicked: {:?}", e);
        }
    }
}
