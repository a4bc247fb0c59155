//! Per-event classification.
//!
//! [`RecordClassifier::classify`] turns one [`Event`] into exactly one
//! [`ClassificationOutcome`]. Checks run in a fixed order and stop at the
//! first failure:
//!
//! 1. ownership ([`TableRouter::should_process`]) → `Skipped`
//! 2. required headers → `Corrupt`
//! 3. operation code mapping → `Corrupt`
//! 4. key/value presence for the operation → `Corrupt`
//! 5. event timestamp canonicalisation (fatal only under
//!    [`TimestampPolicy::Strict`])
//! 6. target table resolution and payload materialization → `Routed`
//!
//! Classification never returns an error; every failure is folded into a
//! [`CorruptRecord`] whose reason is the failure's display text.
use tracing::debug;

use crate::config::{ClassifyConfig, TimestampPolicy};
use crate::error::ClassifyError;
use crate::header::HeaderExtractor;
use crate::operation::{map_entry_type, normalize_code};
use crate::router::TableRouter;
use crate::schema::SchemaInferenceEngine;
use crate::temporal::canonical_timestamp;
use crate::types::{ClassificationOutcome, CorruptRecord, Event, OperationKind, RoutedRecord};

/// Classifies events against one immutable [`ClassifyConfig`].
///
/// Holds no mutable state; a single instance can classify any number of
/// batches.
#[derive(Debug, Clone)]
pub struct RecordClassifier {
    headers: HeaderExtractor,
    router: TableRouter,
    schema: SchemaInferenceEngine,
    timestamp_policy: TimestampPolicy,
}

impl RecordClassifier {
    pub fn new(config: &ClassifyConfig) -> Self {
        Self {
            headers: HeaderExtractor::from_config(config),
            router: TableRouter::from_config(config),
            schema: SchemaInferenceEngine::from_config(config),
            timestamp_policy: config.event_timestamp_policy,
        }
    }

    /// Classifies one event.
    ///
    /// ```rust
    /// use classify::{ClassifyConfig, Event, OperationKind, RecordClassifier};
    /// use serde_json::json;
    ///
    /// let classifier = RecordClassifier::new(&ClassifyConfig::default());
    /// let event = Event::new("cdc.orders", 0, 42)
    ///     .with_header("TableName", "ORDERS")
    ///     .with_header("A_ENTTYP", "DL")
    ///     .with_key(json!({"ID": 1}));
    ///
    /// match classifier.classify(&event) {
    ///     classify::ClassificationOutcome::Routed(record) => {
    ///         assert_eq!(record.target_table, "ORDERS");
    ///         assert_eq!(record.operation, OperationKind::Delete);
    ///         assert!(record.value.is_none());
    ///     }
    ///     other => panic!("unexpected outcome {other:?}"),
    /// }
    /// ```
    pub fn classify(&self, event: &Event) -> ClassificationOutcome {
        if !self.router.should_process(event) {
            debug!(
                topic = %event.topic,
                partition = event.partition,
                offset = event.offset,
                "event_skipped"
            );
            return ClassificationOutcome::Skipped;
        }

        match self.route(event) {
            Ok(record) => {
                debug!(
                    table = %record.target_table,
                    operation = %record.operation,
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    "event_routed"
                );
                ClassificationOutcome::Routed(record)
            }
            Err(err) => {
                debug!(
                    topic = %event.topic,
                    partition = event.partition,
                    offset = event.offset,
                    reason = %err,
                    "event_corrupt"
                );
                ClassificationOutcome::Corrupt(self.corrupt(event, err))
            }
        }
    }

    fn route(&self, event: &Event) -> Result<RoutedRecord, ClassifyError> {
        self.headers.validate_required_headers(event)?;

        let code = normalize_code(
            &self
                .headers
                .extract_operation_code(event)
                .unwrap_or_default(),
        );
        let operation =
            map_entry_type(&code).ok_or_else(|| ClassifyError::UnknownOperationCode {
                header: self.headers.operation_header().to_string(),
                code: code.clone(),
            })?;

        match operation {
            OperationKind::Delete if !event.has_key() => {
                return Err(ClassifyError::MissingKeyForDelete { code });
            }
            OperationKind::Insert | OperationKind::Update | OperationKind::Upsert
                if !event.has_value() =>
            {
                return Err(ClassifyError::MissingValueForWrite { operation, code });
            }
            _ => {}
        }

        let event_timestamp = self.event_timestamp(event)?;

        let table_name = self.headers.extract_table_name(event);
        let target_table = self
            .router
            .resolve_target_table(table_name.as_deref().map(str::trim), Some(&event.topic));

        let key = match &event.key {
            Some(key) if !key.is_null() => {
                Some(self.schema.materialize(key, event.key_schema.as_ref())?)
            }
            _ => None,
        };
        let value = match &event.value {
            Some(value) if !operation.is_delete() => Some(
                self.schema
                    .materialize(value, event.value_schema.as_ref())?,
            ),
            _ => None,
        };

        Ok(RoutedRecord {
            target_table,
            operation,
            operation_code: code,
            key,
            value,
            event_timestamp,
            topic: event.topic.clone(),
            partition: event.partition,
            offset: event.offset,
        })
    }

    fn event_timestamp(&self, event: &Event) -> Result<Option<String>, ClassifyError> {
        let Some(raw) = self.headers.extract_timestamp(event) else {
            return Ok(None);
        };
        match canonical_timestamp(&raw) {
            Ok(canonical) => Ok(canonical),
            Err(err) => match self.timestamp_policy {
                TimestampPolicy::Strict => Err(err),
                TimestampPolicy::BestEffort => {
                    debug!(
                        topic = %event.topic,
                        partition = event.partition,
                        offset = event.offset,
                        raw = %raw,
                        "event_timestamp_unparsed"
                    );
                    Ok(Some(raw))
                }
            },
        }
    }

    fn corrupt(&self, event: &Event, err: ClassifyError) -> CorruptRecord {
        let mut record = CorruptRecord::new(event.clone(), err.to_string());
        record.table_name = self.headers.extract_table_name(event);
        record.operation_code = self.headers.extract_operation_code(event);
        record
    }
}
