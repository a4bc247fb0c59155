//! Batch-level errors.
//!
//! Classification failures never reach this module: they are folded into
//! corrupt records by the classifier. What remains are the failures that end
//! a batch, after which the unit of work has been rolled back.
//!
//! | Error | Cause | Recovery |
//! |-------|-------|----------|
//! | [`BatchError::Write`] | write layer rejected a table group or quarantine rows | retry the batch |
//! | [`BatchError::CorruptRecords`] | tolerance `none` with corrupt events in the batch | fix or quarantine the events |
//! | [`BatchError::Rollback`] | rollback failed after another failure | inspect the sink |
use thiserror::Error;

/// Failure reported by a [`WriteLayer`](crate::WriteLayer).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WriteError {
    /// The sink rejected rows for one table.
    #[error("write to '{table}' failed: {message}")]
    Rejected { table: String, message: String },

    /// Commit of the unit of work failed.
    #[error("commit failed: {0}")]
    Commit(String),

    /// Rollback of the unit of work failed.
    #[error("rollback failed: {0}")]
    Rollback(String),
}

/// Why a batch did not commit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BatchError {
    /// The write layer failed; the whole batch was rolled back.
    #[error("write layer failure on '{table}': {source}")]
    Write {
        /// Target table, quarantine table, or `<commit>`.
        table: String,
        #[source]
        source: WriteError,
    },

    /// Corrupt events under tolerance `none`.
    ///
    /// `report` carries one `topic/partition/offset: reason` line per event,
    /// in batch order.
    #[error("{count} corrupt record(s) in batch:\n{report}")]
    CorruptRecords { count: usize, report: String },

    /// Rolling back after `cause` failed as well.
    #[error("rollback failed after '{cause}': {source}")]
    Rollback {
        cause: String,
        #[source]
        source: WriteError,
    },
}

impl BatchError {
    /// Whether the batch may succeed if retried unchanged.
    ///
    /// Corrupt events stay corrupt, so only write-layer failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BatchError::Write { .. })
    }
}
