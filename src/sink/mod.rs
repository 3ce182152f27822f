//! Incremental persistence of harvested records.
//!
//! The loop calls [`RecordSink::upsert`] after every iteration with that
//! iteration's net-new records, so everything flushed survives a crash of
//! the session that produced it.

mod export;
mod memory;
mod sqlite;

use async_trait::async_trait;

use crate::models::CandidateRecord;

pub use export::{write_csv, write_json_lines, CSV_HEADER};
pub use memory::MemorySink;
pub use sqlite::{AsyncSqliteConnection, SqliteSink};

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Errors from sink backends.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Record rejected: {0}")]
    Rejected(String),
}

impl From<diesel::result::Error> for SinkError {
    fn from(e: diesel::result::Error) -> Self {
        SinkError::Database(e.to_string())
    }
}

impl From<diesel::ConnectionError> for SinkError {
    fn from(e: diesel::ConnectionError) -> Self {
        SinkError::Connection(e.to_string())
    }
}

/// Storage for harvested records.
///
/// Upserts are idempotent on `(source_id, fingerprint)` and safe to call
/// from concurrent sessions.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert or replace a record.
    async fn upsert(&self, source_id: &str, record: &CandidateRecord) -> SinkResult<()>;

    /// Records for one source (or all sources), in a stable order.
    async fn list(&self, source_id: Option<&str>) -> SinkResult<Vec<CandidateRecord>>;

    /// Number of stored records for one source (or all sources).
    async fn count(&self, source_id: Option<&str>) -> SinkResult<usize>;
}

/// Reject records that violate persistence invariants.
pub(crate) fn check_persistable(record: &CandidateRecord) -> SinkResult<()> {
    if record.is_persistable() {
        Ok(())
    } else {
        Err(SinkError::Rejected(format!(
            "record {} does not meet persistence requirements",
            record.fingerprint
        )))
    }
}
