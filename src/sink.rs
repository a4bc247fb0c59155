//! Write-layer contract and the quarantine row shape.
//!
//! The pipeline never talks to a database directly. A [`WriteLayer`] receives
//! routed records per table and quarantine rows, and both kinds of write take
//! part in one unit of work that the pipeline commits or rolls back per
//! batch.
use std::collections::BTreeMap;

use classify::{CorruptRecord, HeaderValue, Payload, RoutedRecord};
use serde::Serialize;
use serde_json::json;

use crate::error::WriteError;

/// Longest `error_reason` a quarantine row carries, in characters.
pub const MAX_ERROR_REASON_CHARS: usize = 1000;

/// Default quarantine table name.
pub const DEFAULT_QUARANTINE_TABLE: &str = "cdc_corrupt_events";

/// Relational sink for one pipeline instance.
///
/// Writes are staged until [`commit`](WriteLayer::commit); after
/// [`rollback`](WriteLayer::rollback) nothing written since the last commit
/// may become visible.
pub trait WriteLayer: Send {
    /// Stages `records` for `table`, in order.
    fn write(&mut self, table: &str, records: &[RoutedRecord]) -> Result<(), WriteError>;
    /// Stages quarantine rows into `table`, in order.
    fn write_corrupt(&mut self, table: &str, rows: &[QuarantineRow]) -> Result<(), WriteError>;
    fn commit(&mut self) -> Result<(), WriteError>;
    fn rollback(&mut self) -> Result<(), WriteError>;
}

/// One row of the quarantine table.
///
/// Key and value are stored as JSON text. Headers are a JSON array of
/// `{"name", "value"}` entries in event order, repeats included. Byte
/// headers that are not UTF-8 are rendered as hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarantineRow {
    pub topic: String,
    pub kafka_partition: i32,
    pub kafka_offset: i64,
    pub record_key: Option<String>,
    pub record_value: Option<String>,
    pub headers: String,
    pub error_reason: String,
    pub table_name: Option<String>,
    pub entry_type: Option<String>,
}

impl QuarantineRow {
    pub fn from_corrupt(record: &CorruptRecord) -> Self {
        let event = &record.event;
        Self {
            topic: event.topic.clone(),
            kafka_partition: event.partition,
            kafka_offset: event.offset,
            record_key: payload_text(event.key.as_ref()),
            record_value: payload_text(event.value.as_ref()),
            headers: headers_text(record),
            error_reason: record
                .reason
                .chars()
                .take(MAX_ERROR_REASON_CHARS)
                .collect(),
            table_name: record.table_name.clone(),
            entry_type: record.operation_code.clone(),
        }
    }
}

fn payload_text(payload: Option<&Payload>) -> Option<String> {
    payload
        .filter(|payload| !payload.is_null())
        .and_then(|payload| serde_json::to_string(payload).ok())
}

fn headers_text(record: &CorruptRecord) -> String {
    let entries: Vec<serde_json::Value> = record
        .event
        .headers
        .iter()
        .map(|header| json!({ "name": header.name, "value": header_text(&header.value) }))
        .collect();
    serde_json::Value::Array(entries).to_string()
}

fn header_text(value: &HeaderValue) -> Option<String> {
    match value {
        HeaderValue::Null => None,
        HeaderValue::Text(text) => Some(text.clone()),
        HeaderValue::Bytes(bytes) => Some(match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => hex(bytes),
        }),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// In-memory [`WriteLayer`] with staged and committed views.
///
/// Used by the replay binary and by tests. Failures can be injected per
/// table, on commit, or on rollback.
#[derive(Debug, Default)]
pub struct MemoryWriteLayer {
    staged: BTreeMap<String, Vec<RoutedRecord>>,
    staged_quarantine: BTreeMap<String, Vec<QuarantineRow>>,
    committed: BTreeMap<String, Vec<RoutedRecord>>,
    committed_quarantine: BTreeMap<String, Vec<QuarantineRow>>,
    write_log: Vec<String>,
    fail_on_table: Option<String>,
    fail_commit: bool,
    fail_rollback: bool,
    commits: usize,
    rollbacks: usize,
}

impl MemoryWriteLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every write addressed to `table`, including quarantine writes.
    pub fn failing_on(mut self, table: impl Into<String>) -> Self {
        self.fail_on_table = Some(table.into());
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    pub fn committed(&self, table: &str) -> &[RoutedRecord] {
        self.committed.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn committed_tables(&self) -> impl Iterator<Item = (&str, &[RoutedRecord])> {
        self.committed
            .iter()
            .map(|(table, records)| (table.as_str(), records.as_slice()))
    }

    pub fn quarantined(&self, table: &str) -> &[QuarantineRow] {
        self.committed_quarantine
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn quarantine_tables(&self) -> impl Iterator<Item = (&str, &[QuarantineRow])> {
        self.committed_quarantine
            .iter()
            .map(|(table, rows)| (table.as_str(), rows.as_slice()))
    }

    /// Rows staged but neither committed nor rolled back.
    pub fn staged_len(&self) -> usize {
        self.staged.values().map(Vec::len).sum::<usize>()
            + self.staged_quarantine.values().map(Vec::len).sum::<usize>()
    }

    /// Every table written, in call order, across all batches.
    pub fn write_log(&self) -> &[String] {
        &self.write_log
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }

    fn check_table(&self, table: &str) -> Result<(), WriteError> {
        match &self.fail_on_table {
            Some(failing) if failing == table => Err(WriteError::Rejected {
                table: table.to_string(),
                message: "injected failure".into(),
            }),
            _ => Ok(()),
        }
    }
}

impl WriteLayer for MemoryWriteLayer {
    fn write(&mut self, table: &str, records: &[RoutedRecord]) -> Result<(), WriteError> {
        self.write_log.push(table.to_string());
        self.check_table(table)?;
        self.staged
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(records);
        Ok(())
    }

    fn write_corrupt(&mut self, table: &str, rows: &[QuarantineRow]) -> Result<(), WriteError> {
        self.write_log.push(table.to_string());
        self.check_table(table)?;
        self.staged_quarantine
            .entry(table.to_string())
            .or_default()
            .extend_from_slice(rows);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), WriteError> {
        if self.fail_commit {
            return Err(WriteError::Commit("injected failure".into()));
        }
        for (table, records) in std::mem::take(&mut self.staged) {
            self.committed.entry(table).or_default().extend(records);
        }
        for (table, rows) in std::mem::take(&mut self.staged_quarantine) {
            self.committed_quarantine
                .entry(table)
                .or_default()
                .extend(rows);
        }
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), WriteError> {
        self.staged.clear();
        self.staged_quarantine.clear();
        self.rollbacks += 1;
        if self.fail_rollback {
            return Err(WriteError::Rollback("injected failure".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classify::{Event, OperationKind};
    use serde_json::json;

    fn routed(table: &str, offset: i64) -> RoutedRecord {
        RoutedRecord {
            target_table: table.into(),
            operation: OperationKind::Insert,
            operation_code: "PT".into(),
            key: None,
            value: None,
            event_timestamp: None,
            topic: "t".into(),
            partition: 0,
            offset,
        }
    }

    #[test]
    fn quarantine_row_renders_event_columns() {
        let event = Event::new("journal", 2, 99)
            .with_key(json!({"ID": 7}))
            .with_header("TableName", "ORDERS")
            .with_header("A_ENTTYP", "ZZ")
            .with_header("raw", vec![0xffu8, 0x01]);
        let mut corrupt = CorruptRecord::new(event, "unrecognized A_ENTTYP code: ZZ");
        corrupt.table_name = Some("ORDERS".into());
        corrupt.operation_code = Some("ZZ".into());

        let row = QuarantineRow::from_corrupt(&corrupt);
        assert_eq!(row.topic, "journal");
        assert_eq!((row.kafka_partition, row.kafka_offset), (2, 99));
        assert_eq!(row.record_key.as_deref(), Some(r#"{"ID":7}"#));
        assert!(row.record_value.is_none());
        assert_eq!(
            row.headers,
            concat!(
                r#"[{"name":"TableName","value":"ORDERS"},"#,
                r#"{"name":"A_ENTTYP","value":"ZZ"},"#,
                r#"{"name":"raw","value":"ff01"}]"#
            )
        );
        assert_eq!(row.entry_type.as_deref(), Some("ZZ"));
    }

    #[test]
    fn repeated_headers_are_all_kept_in_order() {
        let event = Event::new("journal", 0, 1)
            .with_header("TableName", "T")
            .with_header("A_ENTTYP", "ZZ")
            .with_header("A_ENTTYP", "YY")
            .with_header("A_TIMSTAMP", HeaderValue::Null);
        let row = QuarantineRow::from_corrupt(&CorruptRecord::new(event, "bad"));

        let headers: serde_json::Value = serde_json::from_str(&row.headers).unwrap();
        assert_eq!(
            headers,
            json!([
                {"name": "TableName", "value": "T"},
                {"name": "A_ENTTYP", "value": "ZZ"},
                {"name": "A_ENTTYP", "value": "YY"},
                {"name": "A_TIMSTAMP", "value": null}
            ])
        );
    }

    #[test]
    fn long_reasons_are_truncated() {
        let corrupt = CorruptRecord::new(Event::new("t", 0, 0), "x".repeat(1500));
        let row = QuarantineRow::from_corrupt(&corrupt);
        assert_eq!(row.error_reason.chars().count(), MAX_ERROR_REASON_CHARS);
    }

    #[test]
    fn rollback_discards_staged_rows() {
        let mut sink = MemoryWriteLayer::new();
        sink.write("A", &[routed("A", 1)]).unwrap();
        sink.commit().unwrap();
        sink.write("A", &[routed("A", 2)]).unwrap();
        assert_eq!(sink.staged_len(), 1);

        sink.rollback().unwrap();
        assert_eq!(sink.staged_len(), 0);
        assert_eq!(sink.committed("A").len(), 1);
        assert_eq!((sink.commits(), sink.rollbacks()), (1, 1));
    }

    #[test]
    fn injected_table_failure_rejects_write() {
        let mut sink = MemoryWriteLayer::new().failing_on("B");
        assert!(sink.write("A", &[routed("A", 1)]).is_ok());
        let err = sink.write("B", &[routed("B", 2)]).unwrap_err();
        assert!(matches!(err, WriteError::Rejected { ref table, .. } if table == "B"));
        assert_eq!(sink.write_log(), ["A", "B"]);
    }
}
