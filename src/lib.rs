//! Workspace umbrella crate for cdcroute, a change-data-capture sink core.
//!
//! The `classify` crate decides what each journal event is. This crate takes
//! whole batches: it groups routed records per target table, applies the
//! corrupt-record tolerance, persists quarantine rows and drives one
//! all-or-nothing unit of work per batch through a [`WriteLayer`].
//!
//! ## Example
//!
//! ```
//! use cdcroute::{ErrorTolerance, MemoryWriteLayer, Pipeline};
//! use classify::{ClassifyConfig, Event};
//! use serde_json::json;
//!
//! let mut pipeline = Pipeline::new(
//!     &ClassifyConfig::default(),
//!     ErrorTolerance::Log,
//!     MemoryWriteLayer::new(),
//! );
//!
//! let events = vec![
//!     Event::new("journal", 0, 1)
//!         .with_header("TableName", "ORDERS")
//!         .with_header("A_ENTTYP", "PT")
//!         .with_value(json!({"ID": 1})),
//!     Event::new("journal", 0, 2)
//!         .with_header("TableName", "ORDERS")
//!         .with_header("A_ENTTYP", "ZZ")
//!         .with_value(json!({"ID": 2})),
//! ];
//!
//! let summary = pipeline.process_batch(&events).unwrap();
//! assert_eq!((summary.routed, summary.corrupt), (1, 1));
//! assert_eq!(pipeline.writer().committed("ORDERS").len(), 1);
//! ```
mod batch;
mod config;
mod error;
mod pipeline;
mod policy;
mod replay;
mod sink;

pub use crate::batch::{BatchGrouper, GroupedBatch, TableGroup, PROCESSING_ERROR};
pub use crate::config::{
    ClassifyYamlConfig, ConfigLoadError, ENV_TABLE_NAME_FORMAT, ENV_TOLERANCE, ErrorsYamlConfig,
    FieldTypeOverrides, QuarantineYamlConfig, SinkConfig,
};
pub use crate::error::{BatchError, WriteError};
pub use crate::pipeline::{BatchSummary, COMMIT_TARGET, Pipeline};
pub use crate::policy::{ErrorPolicyEngine, ErrorTolerance, InvalidTolerance, corrupt_report};
pub use crate::replay::{EventLine, ReplayError, read_events};
pub use crate::sink::{
    DEFAULT_QUARANTINE_TABLE, MAX_ERROR_REASON_CHARS, MemoryWriteLayer, QuarantineRow,
    WriteLayer,
};
