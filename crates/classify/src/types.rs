//! Core data model types for the classify crate.
//!
//! These types describe CDC events as they arrive from the consumption layer
//! and the outcomes the classifier produces for them.
//!
//! # Type Hierarchy
//!
//! ```text
//! Event
//! ├── topic / partition / offset
//! ├── key: Option<Payload>          value: Option<Payload>
//! │   ├── Json(serde_json::Value)   (schemaless)
//! │   └── Struct(StructuredPayload) (typed)
//! ├── headers: Headers
//! └── key_schema / value_schema: Option<Schema>
//!
//!         ↓ RecordClassifier::classify()
//!
//! ClassificationOutcome
//! ├── Routed(RoutedRecord)   target table + operation + typed sides
//! ├── Corrupt(CorruptRecord) original event + reason
//! └── Skipped                owned by another pipeline instance
//! ```
use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// Row-level change kind derived from an operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Insert,
    Update,
    Upsert,
    Delete,
}

impl OperationKind {
    /// Upper-case name used in logs and quarantine rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Insert => "INSERT",
            OperationKind::Update => "UPDATE",
            OperationKind::Upsert => "UPSERT",
            OperationKind::Delete => "DELETE",
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, OperationKind::Delete)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of column kinds a structured payload can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Int32,
    Int64,
    Float64,
    Boolean,
    Timestamp,
    Date,
    Time,
    Null,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::Float64 => "float64",
            FieldKind::Boolean => "boolean",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Date => "date",
            FieldKind::Time => "time",
            FieldKind::Null => "null",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds a field type override may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalKind {
    Timestamp,
    Date,
    Time,
}

impl TemporalKind {
    pub fn as_str(&self) -> &'static str {
        FieldKind::from(*self).as_str()
    }
}

impl From<TemporalKind> for FieldKind {
    fn from(kind: TemporalKind) -> Self {
        match kind {
            TemporalKind::Timestamp => FieldKind::Timestamp,
            TemporalKind::Date => FieldKind::Date,
            TemporalKind::Time => FieldKind::Time,
        }
    }
}

impl fmt::Display for TemporalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed column value.
///
/// Serializes without a tag: temporal values render as ISO-8601 text and
/// `Null` as JSON `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    String(String),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
}

/// A field name and its declared kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    pub kind: FieldKind,
}

impl TypedField {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Ordered field declarations for one side of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<TypedField>,
}

impl Schema {
    pub fn new(fields: Vec<TypedField>) -> Self {
        Self { fields }
    }

    /// Looks up the declared kind of `name`.
    pub fn kind_of(&self, name: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.kind)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Ordered mapping from field name to typed value.
///
/// Names are unique: [`insert`](StructuredPayload::insert) replaces an
/// existing entry in place, keeping its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuredPayload {
    fields: Vec<(String, FieldValue)>,
}

impl StructuredPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, FieldValue)> for StructuredPayload {
    fn from_iter<I: IntoIterator<Item = (N, FieldValue)>>(iter: I) -> Self {
        let mut payload = StructuredPayload::new();
        for (name, value) in iter {
            payload.insert(name, value);
        }
        payload
    }
}

impl Serialize for StructuredPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Key or value payload of an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Schemaless JSON, as produced by a JSON converter without schemas.
    Json(serde_json::Value),
    /// Already-typed row.
    Struct(StructuredPayload),
}

impl Payload {
    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Json(serde_json::Value::Null))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

impl From<StructuredPayload> for Payload {
    fn from(value: StructuredPayload) -> Self {
        Payload::Struct(value)
    }
}

/// Raw header value as delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Text(String),
    Bytes(Vec<u8>),
    Null,
}

impl HeaderValue {
    /// Decodes the value as text; invalid UTF-8 bytes count as absent.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            HeaderValue::Text(text) => Some(Cow::Borrowed(text.as_str())),
            HeaderValue::Bytes(bytes) => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            HeaderValue::Null => None,
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Text(value)
    }
}

impl From<Vec<u8>> for HeaderValue {
    fn from(value: Vec<u8>) -> Self {
        HeaderValue::Bytes(value)
    }
}

impl From<&[u8]> for HeaderValue {
    fn from(value: &[u8]) -> Self {
        HeaderValue::Bytes(value.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: HeaderValue,
}

/// Ordered header list. Names may repeat; lookups see the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(Vec<Header>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<HeaderValue>) {
        self.0.push(Header {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Last header named `name`, if any.
    pub fn last_with_name(&self, name: &str) -> Option<&HeaderValue> {
        self.0
            .iter()
            .rev()
            .find(|header| header.name == name)
            .map(|header| &header.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Header>> for Headers {
    fn from(value: Vec<Header>) -> Self {
        Headers(value)
    }
}

/// One CDC event as handed over by the consumption layer.
///
/// The classifier only ever borrows events; corrupt outcomes clone them.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Payload>,
    pub value: Option<Payload>,
    pub headers: Headers,
    pub key_schema: Option<Schema>,
    pub value_schema: Option<Schema>,
}

impl Event {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            value: None,
            headers: Headers::new(),
            key_schema: None,
            value_schema: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<Payload>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<Payload>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_key_schema(mut self, schema: Schema) -> Self {
        self.key_schema = Some(schema);
        self
    }

    pub fn with_value_schema(mut self, schema: Schema) -> Self {
        self.value_schema = Some(schema);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.push(name, value);
        self
    }

    pub fn has_key(&self) -> bool {
        self.key.as_ref().is_some_and(|key| !key.is_null())
    }

    pub fn has_value(&self) -> bool {
        self.value.as_ref().is_some_and(|value| !value.is_null())
    }
}

/// One side (key or value) of a routed record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordPart {
    pub schema: Option<Schema>,
    pub payload: Payload,
}

/// An event that passed classification and is ready for the write layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutedRecord {
    pub target_table: String,
    pub operation: OperationKind,
    /// Code as received, after trimming and upper-casing.
    pub operation_code: String,
    pub key: Option<RecordPart>,
    /// Always `None` for [`OperationKind::Delete`].
    pub value: Option<RecordPart>,
    pub event_timestamp: Option<String>,
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// An event that failed classification, kept for quarantine and reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct CorruptRecord {
    pub event: Event,
    pub reason: String,
    /// Table header value, when one could be read.
    pub table_name: Option<String>,
    /// Operation header value, when one could be read.
    pub operation_code: Option<String>,
}

impl CorruptRecord {
    pub fn new(event: Event, reason: impl Into<String>) -> Self {
        Self {
            event,
            reason: reason.into(),
            table_name: None,
            operation_code: None,
        }
    }

    /// `topic/partition/offset` coordinates used in reports.
    pub fn coordinates(&self) -> String {
        format!(
            "{}/{}/{}",
            self.event.topic, self.event.partition, self.event.offset
        )
    }
}

/// Result of classifying exactly one event.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Routed(RoutedRecord),
    Corrupt(CorruptRecord),
    Skipped,
}

impl ClassificationOutcome {
    pub fn is_routed(&self) -> bool {
        matches!(self, ClassificationOutcome::Routed(_))
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, ClassificationOutcome::Corrupt(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ClassificationOutcome::Skipped)
    }
}
