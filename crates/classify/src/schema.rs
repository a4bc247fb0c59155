//! Schema inference and typed materialization for schemaless payloads.
//!
//! JSON sides arrive without a declared schema. The engine reconstructs one
//! from the runtime kind of each value so every batch hands the write layer
//! the same column kinds for the same source fields. Field type overrides
//! take precedence over inference; they are the only way to obtain temporal
//! columns.
//!
//! ```rust
//! use classify::{ClassifyConfig, FieldKind, SchemaInferenceEngine, parse_field_type_overrides};
//! use serde_json::json;
//!
//! let config = ClassifyConfig {
//!     field_type_overrides: parse_field_type_overrides("CREATED:timestamp").unwrap(),
//!     ..Default::default()
//! };
//! let engine = SchemaInferenceEngine::from_config(&config);
//!
//! let row = json!({"ID": 7, "CREATED": "2024-01-02 03:04:05"});
//! let map = row.as_object().unwrap();
//! let schema = engine.build_schema(map);
//!
//! assert_eq!(schema.kind_of("ID"), Some(FieldKind::Int32));
//! assert_eq!(schema.kind_of("CREATED"), Some(FieldKind::Timestamp));
//! ```
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::config::{ClassifyConfig, NameCase};
use crate::error::ClassifyError;
use crate::temporal;
use crate::types::{
    FieldKind, FieldValue, Payload, RecordPart, Schema, StructuredPayload, TemporalKind,
    TypedField,
};

/// Infers schemas and builds [`StructuredPayload`]s from JSON objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaInferenceEngine {
    field_name_case: NameCase,
    overrides: BTreeMap<String, TemporalKind>,
}

impl SchemaInferenceEngine {
    pub fn new(field_name_case: NameCase, overrides: BTreeMap<String, TemporalKind>) -> Self {
        Self {
            field_name_case,
            overrides,
        }
    }

    pub fn from_config(config: &ClassifyConfig) -> Self {
        Self::new(config.field_name_case, config.field_type_overrides.clone())
    }

    /// Declares one field per distinct post-case name, in input order.
    ///
    /// When case normalization folds two source names together, the field
    /// keeps the position of the first and the kind of the last.
    pub fn build_schema(&self, map: &Map<String, Value>) -> Schema {
        let mut fields: Vec<TypedField> = Vec::with_capacity(map.len());
        for (name, value) in map {
            let name = self.field_name_case.apply(name);
            let kind = match self.overrides.get(&name) {
                Some(kind) => FieldKind::from(*kind),
                None => infer_kind(value),
            };
            match fields.iter_mut().find(|field| field.name == name) {
                Some(field) => field.kind = kind,
                None => fields.push(TypedField::new(name, kind)),
            }
        }
        Schema::new(fields)
    }

    /// Materializes `map` against `schema`.
    ///
    /// Overridden fields with text values are coerced; a null stays null.
    /// Any other value under an override cannot be represented and fails
    /// with [`ClassifyError::UnresolvableFieldType`].
    pub fn build_structured_payload(
        &self,
        schema: &Schema,
        map: &Map<String, Value>,
    ) -> Result<StructuredPayload, ClassifyError> {
        let mut payload = StructuredPayload::new();
        for (name, value) in map {
            let name = self.field_name_case.apply(name);
            let typed = match self.overrides.get(&name) {
                Some(kind) => coerce_override(&name, value, *kind)?,
                None => native_value(value, schema.kind_of(&name)),
            };
            payload.insert(name, typed);
        }
        Ok(payload)
    }

    /// Produces the routed form of one event side.
    ///
    /// Only a JSON object without an attached schema is inferred. Everything
    /// else passes through with the schema it arrived with.
    pub fn materialize(
        &self,
        payload: &Payload,
        schema: Option<&Schema>,
    ) -> Result<RecordPart, ClassifyError> {
        match (payload, schema) {
            (Payload::Json(Value::Object(map)), None) => {
                let schema = self.build_schema(map);
                let structured = self.build_structured_payload(&schema, map)?;
                Ok(RecordPart {
                    schema: Some(schema),
                    payload: Payload::Struct(structured),
                })
            }
            (payload, schema) => Ok(RecordPart {
                schema: schema.cloned(),
                payload: payload.clone(),
            }),
        }
    }
}

/// Declared kind for a JSON value with no override.
pub fn infer_kind(value: &Value) -> FieldKind {
    match value {
        Value::Bool(_) => FieldKind::Boolean,
        Value::Number(number) => match number.as_i64() {
            Some(int) if i32::try_from(int).is_ok() => FieldKind::Int32,
            Some(_) => FieldKind::Int64,
            // Integral but wider than i64: kept as exact decimal text.
            None if number.is_u64() => FieldKind::String,
            None => FieldKind::Float64,
        },
        Value::Null | Value::String(_) | Value::Array(_) | Value::Object(_) => FieldKind::String,
    }
}

fn coerce_override(
    name: &str,
    value: &Value,
    kind: TemporalKind,
) -> Result<FieldValue, ClassifyError> {
    match value {
        Value::String(text) => temporal::coerce(text, kind),
        Value::Null => Ok(FieldValue::Null),
        other => Err(ClassifyError::UnresolvableFieldType {
            field: name.to_string(),
            declared: kind,
            found: infer_kind(other),
        }),
    }
}

/// Copies a JSON value into the closed value set.
///
/// A merged duplicate may have been declared wider than its own value, so
/// integers follow the declared kind when one is known.
fn native_value(value: &Value, declared: Option<FieldKind>) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Bool(flag) => FieldValue::Boolean(*flag),
        Value::String(text) => FieldValue::String(text.clone()),
        Value::Number(number) => match (number.as_i64(), declared) {
            (Some(int), Some(FieldKind::Int64)) => FieldValue::Int64(int),
            (Some(int), _) => match i32::try_from(int) {
                Ok(small) => FieldValue::Int32(small),
                Err(_) => FieldValue::Int64(int),
            },
            (None, _) if number.is_u64() => FieldValue::String(number.to_string()),
            (None, _) => FieldValue::Float64(number.as_f64().unwrap_or(f64::NAN)),
        },
        Value::Array(_) | Value::Object(_) => FieldValue::String(value.to_string()),
    }
}
