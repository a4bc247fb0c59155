//! Error types produced by the classify crate.
//!
//! Every variant describes why a single event could not be routed. The
//! classifier never propagates these out of a batch: the [`Display`] text of
//! the error becomes the reason string carried by a
//! [`CorruptRecord`](crate::CorruptRecord).
//!
//! # Error Categories
//!
//! | Error | Raised by | Description |
//! |-------|-----------|-------------|
//! | [`MissingHeader`](ClassifyError::MissingHeader) | header validation | Table or operation header absent or blank |
//! | [`UnknownOperationCode`](ClassifyError::UnknownOperationCode) | operation mapping | Code is not in the mapping table |
//! | [`MissingKeyForDelete`](ClassifyError::MissingKeyForDelete) | side validation | DELETE without a key |
//! | [`MissingValueForWrite`](ClassifyError::MissingValueForWrite) | side validation | INSERT/UPDATE/UPSERT without a value |
//! | [`TimestampParseFailure`](ClassifyError::TimestampParseFailure) | temporal coercion | No pattern accepted the input |
//! | [`UnresolvableFieldType`](ClassifyError::UnresolvableFieldType) | payload materialization | Override cannot apply to the value |
//!
//! # Examples
//!
//! ```rust
//! use classify::ClassifyError;
//!
//! let err = ClassifyError::MissingHeader { header: "A_ENTTYP".into() };
//! assert_eq!(err.to_string(), "missing or empty header: A_ENTTYP");
//! ```
use thiserror::Error;

use crate::types::{FieldKind, OperationKind, TemporalKind};

/// Reasons a CDC event is classified as corrupt.
///
/// All variants are cheap to clone and comparable so tests can match on the
/// exact failure. The enum is `#[non_exhaustive]`; include a catch-all arm.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClassifyError {
    /// A required header (table name or operation code) is missing or blank.
    ///
    /// The message names the configured header so operators can tell which
    /// producer setting is wrong.
    #[error("missing or empty header: {header}")]
    MissingHeader {
        /// Configured name of the header that was expected.
        header: String,
    },

    /// The operation header carried a code with no mapping.
    #[error("unrecognized {header} code: {code}")]
    UnknownOperationCode {
        /// Configured operation header name.
        header: String,
        /// Normalized (trimmed, upper-cased) code that failed to map.
        code: String,
    },

    /// A DELETE arrived without a key, so the target row cannot be addressed.
    #[error("DELETE operation ({code}) requires a non-null key")]
    MissingKeyForDelete {
        /// Operation code that mapped to DELETE.
        code: String,
    },

    /// An INSERT, UPDATE, or UPSERT arrived without a row image.
    #[error("{operation} operation ({code}) requires a non-null value")]
    MissingValueForWrite {
        /// Operation the code mapped to.
        operation: OperationKind,
        /// Operation code as received.
        code: String,
    },

    /// No configured pattern could parse a temporal string.
    ///
    /// The message enumerates every pattern that was tried.
    #[error("cannot parse '{value}' as {kind}; tried patterns: {}", .patterns.join(", "))]
    TimestampParseFailure {
        /// Offending input, untrimmed.
        value: String,
        /// Target temporal kind.
        kind: TemporalKind,
        /// Patterns tried, in order.
        patterns: Vec<String>,
    },

    /// A type override names a field whose value cannot be coerced.
    ///
    /// Overrides only coerce textual values; any other non-null value
    /// under an override lands here.
    #[error("field '{field}' is declared {declared} but carries a {found} value")]
    UnresolvableFieldType {
        /// Post-case field name.
        field: String,
        /// Kind requested by the override.
        declared: TemporalKind,
        /// Kind actually observed in the payload.
        found: FieldKind,
    },
}
