//! Append-only outcome ledger. The storage engine hides behind the
//! `OutcomeStore` trait so the session controller and the learners never
//! touch SQL directly.

mod record;
mod sqlite;
mod writer;

use crate::error::EngineError;

fn store_err(msg: impl std::fmt::Display) -> EngineError {
    EngineError::Store(msg.to_string())
}

fn store_err_with<E: std::fmt::Display>(context: &str, err: E) -> EngineError {
    EngineError::Store(format!("{}: {}", context, err))
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

pub use record::{AttemptRecord, NewAttempt, NewTendencyEvent, TendencyEvent};
pub use sqlite::SqliteOutcomeStore;

/// Ledger interface: appends are individually transactional and nothing
/// is ever updated or deleted. Readers tolerate a slightly stale
/// snapshot; the learners optimize long-run convergence, not
/// per-request correctness.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Persist one fully-scored attempt. Only fully-scored attempts may
    /// be appended; service failures never reach this call.
    async fn append(&self, attempt: NewAttempt) -> Result<AttemptRecord>;

    /// Audit trail for the realism-tendency blending rule.
    async fn append_tendency_event(&self, event: NewTendencyEvent) -> Result<i64>;

    async fn query_subject_component(
        &self,
        subject: &str,
        component_type: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttemptRecord>>;

    async fn query_global(&self) -> Result<Vec<AttemptRecord>>;

    /// Rows qualifying for the weight learner: detector + subjective
    /// scores both present.
    async fn count_qualifying(&self) -> Result<u64>;

    /// Monotonic ledger version (max rowid); the weight cache's
    /// invalidation key.
    async fn ledger_version(&self) -> Result<u64>;
}
