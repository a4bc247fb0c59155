use std::io::Write;
use std::sync::{Arc, Mutex};

use cdcroute::{
    BatchError, BatchSummary, DEFAULT_QUARANTINE_TABLE, ErrorTolerance, MemoryWriteLayer,
    Pipeline, WriteError, WriteLayer,
};
use classify::{ClassifyConfig, Event};
use serde_json::json;

/// Buffer handed to the fmt subscriber so tests can count emitted events.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

fn write_event(table: &str, offset: i64) -> Event {
    Event::new("journal.cdc", 0, offset)
        .with_header("TableName", table)
        .with_header("A_ENTTYP", "PT")
        .with_value(json!({"ID": offset}))
}

fn corrupt_event(offset: i64) -> Event {
    Event::new("journal.cdc", 0, offset)
        .with_header("TableName", "ORDERS")
        .with_header("A_ENTTYP", "ZZ")
        .with_value(json!({"ID": offset}))
}

/// Three ORDERS writes, two CUSTOMERS writes, and one unknown code.
fn mixed_batch() -> Vec<Event> {
    vec![
        write_event("ORDERS", 1),
        write_event("CUSTOMERS", 2),
        corrupt_event(3),
        write_event("ORDERS", 4),
        write_event("CUSTOMERS", 5),
        write_event("ORDERS", 6),
    ]
}

fn pipeline(tolerance: ErrorTolerance, writer: MemoryWriteLayer) -> Pipeline<MemoryWriteLayer> {
    Pipeline::new(&ClassifyConfig::default(), tolerance, writer)
}

fn offsets(writer: &MemoryWriteLayer, table: &str) -> Vec<i64> {
    writer
        .committed(table)
        .iter()
        .map(|record| record.offset)
        .collect()
}

#[test]
fn tolerance_none_fails_batch_and_commits_nothing() {
    let mut pipeline = pipeline(ErrorTolerance::None, MemoryWriteLayer::new());

    let err = pipeline.process_batch(&mixed_batch()).unwrap_err();
    match &err {
        BatchError::CorruptRecords { count, report } => {
            assert_eq!(*count, 1);
            assert_eq!(report, "journal.cdc/0/3: unrecognized A_ENTTYP code: ZZ");
        }
        other => panic!("expected corrupt records error, got {other:?}"),
    }
    assert!(!err.is_retryable());

    let writer = pipeline.writer();
    assert!(writer.committed("ORDERS").is_empty());
    assert!(writer.committed("CUSTOMERS").is_empty());
    assert_eq!(writer.staged_len(), 0);
    assert_eq!(writer.rollbacks(), 1);
    assert_eq!(writer.commits(), 0);
}

#[test]
fn tolerance_log_commits_groups_and_warns_once_per_corrupt_record() {
    let mut pipeline = pipeline(ErrorTolerance::Log, MemoryWriteLayer::new());

    let (result, logs) = with_captured_logs(|| pipeline.process_batch(&mixed_batch()));
    let summary = result.unwrap();

    assert_eq!(
        summary,
        BatchSummary {
            routed: 5,
            tables: 2,
            corrupt: 1,
            quarantined: 0,
            skipped: 0,
        }
    );
    assert_eq!(logs.matches("corrupt_record_skipped").count(), 1);
    assert!(logs.contains("offset=3"));

    let writer = pipeline.writer();
    assert_eq!(offsets(writer, "ORDERS"), vec![1, 4, 6]);
    assert_eq!(offsets(writer, "CUSTOMERS"), vec![2, 5]);
    assert_eq!(writer.write_log(), ["ORDERS", "CUSTOMERS"]);
    assert_eq!(writer.commits(), 1);
}

#[test]
fn tolerance_all_commits_silently() {
    let mut pipeline = pipeline(ErrorTolerance::All, MemoryWriteLayer::new());

    let (result, logs) = with_captured_logs(|| pipeline.process_batch(&mixed_batch()));
    let summary = result.unwrap();

    assert_eq!(summary.routed, 5);
    assert_eq!(summary.corrupt, 1);
    assert!(!logs.contains("corrupt_record_skipped"));
    assert_eq!(offsets(pipeline.writer(), "ORDERS"), vec![1, 4, 6]);
}

#[test]
fn quarantine_rows_are_written_after_table_groups() {
    let mut pipeline = pipeline(ErrorTolerance::All, MemoryWriteLayer::new())
        .with_quarantine(DEFAULT_QUARANTINE_TABLE);

    let summary = pipeline.process_batch(&mixed_batch()).unwrap();
    assert_eq!(summary.quarantined, 1);

    let writer = pipeline.writer();
    assert_eq!(
        writer.write_log(),
        ["ORDERS", "CUSTOMERS", DEFAULT_QUARANTINE_TABLE]
    );

    let rows = writer.quarantined(DEFAULT_QUARANTINE_TABLE);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.topic, "journal.cdc");
    assert_eq!((row.kafka_partition, row.kafka_offset), (0, 3));
    assert_eq!(row.error_reason, "unrecognized A_ENTTYP code: ZZ");
    assert_eq!(row.table_name.as_deref(), Some("ORDERS"));
    assert_eq!(row.entry_type.as_deref(), Some("ZZ"));
    assert_eq!(row.record_value.as_deref(), Some(r#"{"ID":3}"#));
    assert_eq!(row.record_key, None);

    let headers: serde_json::Value = serde_json::from_str(&row.headers).unwrap();
    assert_eq!(
        headers,
        json!([
            {"name": "TableName", "value": "ORDERS"},
            {"name": "A_ENTTYP", "value": "ZZ"}
        ])
    );
}

#[test]
fn quarantine_survives_tolerance_none() {
    let mut pipeline = pipeline(ErrorTolerance::None, MemoryWriteLayer::new())
        .with_quarantine(DEFAULT_QUARANTINE_TABLE);

    let err = pipeline.process_batch(&mixed_batch()).unwrap_err();
    assert!(matches!(err, BatchError::CorruptRecords { count: 1, .. }));

    let writer = pipeline.writer();
    assert!(writer.committed("ORDERS").is_empty());
    assert_eq!(writer.quarantined(DEFAULT_QUARANTINE_TABLE).len(), 1);
    assert_eq!(writer.rollbacks(), 1);
    assert_eq!(writer.commits(), 1);
}

#[test]
fn write_failure_rolls_back_every_group() {
    let mut pipeline = pipeline(
        ErrorTolerance::All,
        MemoryWriteLayer::new().failing_on("CUSTOMERS"),
    );

    let err = pipeline.process_batch(&mixed_batch()).unwrap_err();
    assert!(err.is_retryable());
    match err {
        BatchError::Write { table, source } => {
            assert_eq!(table, "CUSTOMERS");
            assert!(matches!(source, WriteError::Rejected { .. }));
        }
        other => panic!("expected write error, got {other:?}"),
    }

    let writer = pipeline.writer();
    assert_eq!(writer.write_log(), ["ORDERS", "CUSTOMERS"]);
    assert!(writer.committed("ORDERS").is_empty());
    assert_eq!(writer.staged_len(), 0);
    assert_eq!(writer.rollbacks(), 1);
}

#[test]
fn rollback_failure_wraps_the_original_cause() {
    let mut pipeline = pipeline(
        ErrorTolerance::All,
        MemoryWriteLayer::new()
            .failing_on("ORDERS")
            .failing_rollback(),
    );

    let err = pipeline.process_batch(&mixed_batch()).unwrap_err();
    match err {
        BatchError::Rollback { cause, source } => {
            assert!(cause.contains("ORDERS"), "cause: {cause}");
            assert!(matches!(source, WriteError::Rollback(_)));
        }
        other => panic!("expected rollback error, got {other:?}"),
    }
}

#[test]
fn commit_failure_is_reported_as_commit_target() {
    let mut pipeline = pipeline(ErrorTolerance::All, MemoryWriteLayer::new().failing_commit());

    let err = pipeline.process_batch(&mixed_batch()).unwrap_err();
    assert!(matches!(
        err,
        BatchError::Write { ref table, source: WriteError::Commit(_) } if table == "<commit>"
    ));
    assert!(pipeline.writer().committed("ORDERS").is_empty());
}

#[test]
fn empty_batch_touches_nothing() {
    let mut pipeline = pipeline(ErrorTolerance::None, MemoryWriteLayer::new());

    let summary = pipeline.process_batch(&[]).unwrap();
    assert_eq!(summary, BatchSummary::default());

    let writer = pipeline.writer();
    assert!(writer.write_log().is_empty());
    assert_eq!(writer.commits(), 0);
    assert_eq!(writer.rollbacks(), 0);
}

#[test]
fn skipped_events_are_counted_but_not_written() {
    let config = ClassifyConfig {
        table_name_format: "ORDERS".into(),
        ..Default::default()
    };
    let mut pipeline = Pipeline::new(&config, ErrorTolerance::None, MemoryWriteLayer::new());

    let summary = pipeline
        .process_batch(&[
            write_event("ORDERS", 1),
            write_event("CUSTOMERS", 2),
            write_event("CUSTOMERS", 3),
        ])
        .unwrap();
    assert_eq!(summary.routed, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(pipeline.writer().write_log(), ["ORDERS"]);
}

#[test]
fn pipeline_recovers_after_a_failed_batch() {
    let mut pipeline = pipeline(ErrorTolerance::None, MemoryWriteLayer::new());

    assert!(pipeline.process_batch(&mixed_batch()).is_err());
    let summary = pipeline
        .process_batch(&[write_event("ORDERS", 10), write_event("ORDERS", 11)])
        .unwrap();

    assert_eq!(summary.routed, 2);
    let writer = pipeline.into_writer();
    assert_eq!(offsets(&writer, "ORDERS"), vec![10, 11]);
}

/// Counts write calls before delegating to memory.
struct CountingWriter {
    inner: MemoryWriteLayer,
    writes: usize,
}

impl WriteLayer for CountingWriter {
    fn write(&mut self, table: &str, records: &[classify::RoutedRecord]) -> Result<(), WriteError> {
        self.writes += 1;
        self.inner.write(table, records)
    }

    fn write_corrupt(
        &mut self,
        table: &str,
        rows: &[cdcroute::QuarantineRow],
    ) -> Result<(), WriteError> {
        self.writes += 1;
        self.inner.write_corrupt(table, rows)
    }

    fn commit(&mut self) -> Result<(), WriteError> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), WriteError> {
        self.inner.rollback()
    }
}

#[test]
fn one_write_call_per_target_table() {
    let writer = CountingWriter {
        inner: MemoryWriteLayer::new(),
        writes: 0,
    };
    let mut pipeline = Pipeline::new(&ClassifyConfig::default(), ErrorTolerance::All, writer);

    pipeline.process_batch(&mixed_batch()).unwrap();
    let writer = pipeline.into_writer();
    assert_eq!(writer.writes, 2);
    assert_eq!(writer.inner.committed("ORDERS").len(), 3);
}

/// Memory sink whose rollbacks fail after the first one.
struct SecondRollbackFails {
    inner: MemoryWriteLayer,
}

impl WriteLayer for SecondRollbackFails {
    fn write(&mut self, table: &str, records: &[classify::RoutedRecord]) -> Result<(), WriteError> {
        self.inner.write(table, records)
    }

    fn write_corrupt(
        &mut self,
        table: &str,
        rows: &[cdcroute::QuarantineRow],
    ) -> Result<(), WriteError> {
        self.inner.write_corrupt(table, rows)
    }

    fn commit(&mut self) -> Result<(), WriteError> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), WriteError> {
        self.inner.rollback()?;
        if self.inner.rollbacks() > 1 {
            return Err(WriteError::Rollback("connection lost".into()));
        }
        Ok(())
    }
}

#[test]
fn failed_quarantine_rollback_is_logged() {
    let writer = SecondRollbackFails {
        inner: MemoryWriteLayer::new().failing_commit(),
    };
    let mut pipeline = Pipeline::new(&ClassifyConfig::default(), ErrorTolerance::None, writer)
        .with_quarantine(DEFAULT_QUARANTINE_TABLE);

    let (result, logs) = with_captured_logs(|| pipeline.process_batch(&mixed_batch()));
    assert!(matches!(result, Err(BatchError::CorruptRecords { count: 1, .. })));
    assert!(logs.contains("quarantine_after_abort_failed"));
    assert!(logs.contains("quarantine_rollback_failed"));
    assert!(logs.contains("connection lost"));

    let writer = pipeline.into_writer();
    assert!(writer.inner.quarantined(DEFAULT_QUARANTINE_TABLE).is_empty());
    assert_eq!(writer.inner.rollbacks(), 2);
}
