//! Batch unit of work.
use std::time::Instant;

use classify::{ClassifyConfig, Event, RecordClassifier};
use metrics::counter;
use tracing::{error, info, info_span, warn};

use crate::batch::{BatchGrouper, GroupedBatch};
use crate::config::{ConfigLoadError, SinkConfig};
use crate::error::BatchError;
use crate::policy::{ErrorPolicyEngine, ErrorTolerance};
use crate::sink::{QuarantineRow, WriteLayer};

/// Pseudo-table reported when a commit fails.
pub const COMMIT_TARGET: &str = "<commit>";

/// Counts for one committed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub routed: usize,
    pub tables: usize,
    pub corrupt: usize,
    pub quarantined: usize,
    pub skipped: usize,
}

/// Classifies, groups, and writes batches through one [`WriteLayer`].
///
/// Every call to [`process_batch`](Pipeline::process_batch) is one unit of
/// work: it either commits everything it wrote or rolls all of it back.
pub struct Pipeline<W> {
    grouper: BatchGrouper,
    policy: ErrorPolicyEngine,
    quarantine_table: Option<String>,
    writer: W,
}

impl<W: WriteLayer> Pipeline<W> {
    pub fn new(config: &ClassifyConfig, tolerance: ErrorTolerance, writer: W) -> Self {
        Self {
            grouper: BatchGrouper::new(RecordClassifier::new(config)),
            policy: ErrorPolicyEngine::new(tolerance),
            quarantine_table: None,
            writer,
        }
    }

    pub fn from_config(config: &SinkConfig, writer: W) -> Result<Self, ConfigLoadError> {
        config.validate()?;
        let pipeline = Self::new(&config.classify_config()?, config.errors.tolerance, writer);
        Ok(match config.quarantine_table() {
            Some(table) => pipeline.with_quarantine(table),
            None => pipeline,
        })
    }

    /// Persists corrupt records into `table`.
    pub fn with_quarantine(mut self, table: impl Into<String>) -> Self {
        self.quarantine_table = Some(table.into());
        self
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Processes one batch.
    ///
    /// Table groups are written in first-seen order, then quarantine rows,
    /// then the tolerance decision is made and the unit of work committed.
    /// Any failure rolls the unit of work back. Under
    /// [`ErrorTolerance::None`] the quarantine rows are then written again in
    /// a unit of their own so the failing events stay diagnosable.
    pub fn process_batch(&mut self, events: &[Event]) -> Result<BatchSummary, BatchError> {
        if events.is_empty() {
            return Ok(BatchSummary::default());
        }

        let start = Instant::now();
        let span = info_span!("cdcroute.batch", size = events.len());
        let _guard = span.enter();

        let batch = self.grouper.group(events);
        counter!("cdcroute_events_routed_total").increment(batch.routed() as u64);
        counter!("cdcroute_events_corrupt_total").increment(batch.corrupt().len() as u64);
        counter!("cdcroute_events_skipped_total").increment(batch.skipped() as u64);

        match self.write_batch(&batch) {
            Ok(summary) => {
                info!(
                    routed = summary.routed,
                    tables = summary.tables,
                    corrupt = summary.corrupt,
                    quarantined = summary.quarantined,
                    skipped = summary.skipped,
                    elapsed_micros = start.elapsed().as_micros(),
                    "batch_committed"
                );
                Ok(summary)
            }
            Err(err) => {
                counter!("cdcroute_batches_failed_total").increment(1);
                let err = self.abort(err);
                if matches!(err, BatchError::CorruptRecords { .. }) {
                    self.quarantine_after_abort(&batch);
                }
                error!(
                    error = %err,
                    elapsed_micros = start.elapsed().as_micros(),
                    "batch_failed"
                );
                Err(err)
            }
        }
    }

    fn write_batch(&mut self, batch: &GroupedBatch) -> Result<BatchSummary, BatchError> {
        for group in batch.groups() {
            self.writer
                .write(&group.table, &group.records)
                .map_err(|source| BatchError::Write {
                    table: group.table.clone(),
                    source,
                })?;
        }

        let quarantined = self.write_quarantine(batch)?;
        self.policy.apply(batch.corrupt())?;

        self.writer.commit().map_err(|source| BatchError::Write {
            table: COMMIT_TARGET.to_string(),
            source,
        })?;

        Ok(BatchSummary {
            routed: batch.routed(),
            tables: batch.groups().len(),
            corrupt: batch.corrupt().len(),
            quarantined,
            skipped: batch.skipped(),
        })
    }

    fn write_quarantine(&mut self, batch: &GroupedBatch) -> Result<usize, BatchError> {
        let Some(table) = &self.quarantine_table else {
            return Ok(0);
        };
        if batch.corrupt().is_empty() {
            return Ok(0);
        }
        let rows: Vec<QuarantineRow> = batch
            .corrupt()
            .iter()
            .map(QuarantineRow::from_corrupt)
            .collect();
        self.writer
            .write_corrupt(table, &rows)
            .map_err(|source| BatchError::Write {
                table: table.clone(),
                source,
            })?;
        Ok(rows.len())
    }

    fn abort(&mut self, cause: BatchError) -> BatchError {
        match self.writer.rollback() {
            Ok(()) => cause,
            Err(source) => BatchError::Rollback {
                cause: cause.to_string(),
                source,
            },
        }
    }

    fn quarantine_after_abort(&mut self, batch: &GroupedBatch) {
        let result = self
            .write_quarantine(batch)
            .and_then(|written| match written {
                0 => Ok(0),
                n => self
                    .writer
                    .commit()
                    .map(|()| n)
                    .map_err(|source| BatchError::Write {
                        table: COMMIT_TARGET.to_string(),
                        source,
                    }),
            });
        match result {
            Ok(0) => {}
            Ok(written) => warn!(quarantined = written, "quarantine_committed_after_abort"),
            Err(err) => {
                error!(error = %err, "quarantine_after_abort_failed");
                if let Err(rollback) = self.writer.rollback() {
                    error!(error = %rollback, "quarantine_rollback_failed");
                }
            }
        }
    }
}
