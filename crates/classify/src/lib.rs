//! CDC Event Classification
//!
//! Every change event read from a replicated database journal passes through
//! here before anything touches the relational sink. We look at its headers,
//! decide whether this pipeline instance owns it, and turn it into either a
//! typed, table-addressed record or a corrupt record with a reason.
//!
//! ## What we do here
//!
//! - **Read headers** - Table name, operation code and commit timestamp, by
//!   configurable header names. Last header wins, byte values decode as UTF-8.
//! - **Map operation codes** - Journal codes like `PT`, `UP`, `DL` become one
//!   of INSERT, UPDATE, UPSERT or DELETE.
//! - **Coerce temporal text** - Ordered, strict pattern fallback for
//!   timestamps, dates and times.
//! - **Infer schemas** - Schemaless JSON sides get a declared schema and a
//!   typed payload, with per-field overrides.
//! - **Route** - Resolve the target table from a template or claim a single
//!   literal table when several instances share a topic.
//!
//! ## Main entry point
//!
//! Build a [`RecordClassifier`] from a validated [`ClassifyConfig`] and call
//! [`RecordClassifier::classify`] once per event. It never fails: problems come
//! back as [`ClassificationOutcome::Corrupt`].
//!
//! ## Example
//!
//! ```
//! use classify::{ClassificationOutcome, ClassifyConfig, Event, RecordClassifier};
//! use serde_json::json;
//!
//! let config = ClassifyConfig {
//!     table_name_format: "${TableName}_sink".into(),
//!     ..Default::default()
//! };
//! config.validate().unwrap();
//!
//! let classifier = RecordClassifier::new(&config);
//! let event = Event::new("journal", 0, 7)
//!     .with_header("TableName", "ORDERS")
//!     .with_header("A_ENTTYP", "PT")
//!     .with_header("A_TIMSTAMP", "2024-01-02 03:04:05.678000000000")
//!     .with_value(json!({"ID": 1, "STATUS": "NEW"}));
//!
//! let ClassificationOutcome::Routed(record) = classifier.classify(&event) else {
//!     panic!("expected a routed record");
//! };
//! assert_eq!(record.target_table, "ORDERS_sink");
//! assert_eq!(record.event_timestamp.as_deref(), Some("2024-01-02T03:04:05.678Z"));
//! ```
mod classifier;
mod config;
mod error;
mod header;
mod operation;
mod router;
mod schema;
mod temporal;
mod types;

pub use crate::classifier::RecordClassifier;
pub use crate::config::{
    parse_field_type_overrides, parse_override_entry, ClassifyConfig, ConfigError, NameCase,
    TimestampPolicy, DEFAULT_OPERATION_HEADER, DEFAULT_TABLE_HEADER, DEFAULT_TABLE_NAME_FORMAT,
    DEFAULT_TIMESTAMP_HEADER,
};
pub use crate::error::ClassifyError;
pub use crate::header::HeaderExtractor;
pub use crate::operation::{map_entry_type, normalize_code};
pub use crate::router::{TableRouter, TABLE_NAME_PLACEHOLDER, TOPIC_PLACEHOLDER};
pub use crate::schema::{infer_kind, SchemaInferenceEngine};
pub use crate::temporal::{
    canonical_timestamp, coerce, patterns_for, render_timestamp, DATE_PATTERNS,
    TIMESTAMP_PATTERNS, TIME_PATTERNS,
};
pub use crate::types::{
    ClassificationOutcome, CorruptRecord, Event, FieldKind, FieldValue, Header, HeaderValue,
    Headers, OperationKind, Payload, RecordPart, RoutedRecord, Schema, StructuredPayload,
    TemporalKind, TypedField,
};
