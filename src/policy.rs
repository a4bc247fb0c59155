//! Corrupt-record tolerance.
use std::fmt;
use std::str::FromStr;

use classify::CorruptRecord;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::BatchError;

/// How a batch reacts to corrupt events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorTolerance {
    /// Fail the batch; nothing it wrote is committed.
    #[default]
    None,
    /// Warn once per corrupt event and commit the valid records.
    Log,
    /// Commit the valid records without logging.
    All,
}

impl ErrorTolerance {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorTolerance::None => "none",
            ErrorTolerance::Log => "log",
            ErrorTolerance::All => "all",
        }
    }
}

impl fmt::Display for ErrorTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid error tolerance '{0}'; expected none, log, or all")]
pub struct InvalidTolerance(pub String);

impl FromStr for ErrorTolerance {
    type Err = InvalidTolerance;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(ErrorTolerance::None),
            "log" => Ok(ErrorTolerance::Log),
            "all" => Ok(ErrorTolerance::All),
            _ => Err(InvalidTolerance(value.to_string())),
        }
    }
}

/// Applies an [`ErrorTolerance`] to the corrupt records of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorPolicyEngine {
    tolerance: ErrorTolerance,
}

impl ErrorPolicyEngine {
    pub fn new(tolerance: ErrorTolerance) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> ErrorTolerance {
        self.tolerance
    }

    /// Returns the number of corrupt records the batch may drop, or the
    /// batch-level failure under [`ErrorTolerance::None`].
    ///
    /// ```rust
    /// use cdcroute::{ErrorPolicyEngine, ErrorTolerance};
    /// use classify::{CorruptRecord, Event};
    ///
    /// let corrupt = vec![CorruptRecord::new(Event::new("journal", 0, 5), "missing or empty header: A_ENTTYP")];
    ///
    /// assert_eq!(ErrorPolicyEngine::new(ErrorTolerance::All).apply(&corrupt), Ok(1));
    ///
    /// let err = ErrorPolicyEngine::new(ErrorTolerance::None).apply(&corrupt).unwrap_err();
    /// assert!(err.to_string().contains("journal/0/5: missing or empty header: A_ENTTYP"));
    /// ```
    pub fn apply(&self, corrupt: &[CorruptRecord]) -> Result<usize, BatchError> {
        if corrupt.is_empty() {
            return Ok(0);
        }
        match self.tolerance {
            ErrorTolerance::None => Err(BatchError::CorruptRecords {
                count: corrupt.len(),
                report: corrupt_report(corrupt),
            }),
            ErrorTolerance::Log => {
                for record in corrupt {
                    warn!(
                        topic = %record.event.topic,
                        partition = record.event.partition,
                        offset = record.event.offset,
                        reason = %record.reason,
                        "corrupt_record_skipped"
                    );
                }
                Ok(corrupt.len())
            }
            ErrorTolerance::All => Ok(corrupt.len()),
        }
    }
}

/// One `topic/partition/offset: reason` line per record.
pub fn corrupt_report(corrupt: &[CorruptRecord]) -> String {
    corrupt
        .iter()
        .map(|record| format!("{}: {}", record.coordinates(), record.reason))
        .collect::<Vec<_>>()
        .join("\n")
}
