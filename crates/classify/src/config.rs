//! Configuration types for the classification stage.
//!
//! [`ClassifyConfig`] is read once at start-up and shared immutably by every
//! batch a pipeline instance processes. It is cheap to clone and serializes
//! to and from JSON, TOML, or YAML.
//!
//! # Quick Start
//!
//! ```rust
//! use classify::{ClassifyConfig, NameCase, parse_field_type_overrides};
//!
//! let config = ClassifyConfig {
//!     table_name_format: "${TableName}_sink".into(),
//!     field_name_case: NameCase::Lower,
//!     field_type_overrides: parse_field_type_overrides("created_at:timestamp,order_date:date")
//!         .expect("valid overrides"),
//!     ..Default::default()
//! };
//!
//! config.validate().expect("invalid configuration");
//! ```
use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::TemporalKind;

pub const DEFAULT_TABLE_HEADER: &str = "TableName";
pub const DEFAULT_OPERATION_HEADER: &str = "A_ENTTYP";
pub const DEFAULT_TIMESTAMP_HEADER: &str = "A_TIMSTAMP";
pub const DEFAULT_TABLE_NAME_FORMAT: &str = "${TableName}";

/// Runtime configuration for event classification.
///
/// # Serialization
///
/// ```json
/// {
///   "table_header": "TableName",
///   "operation_header": "A_ENTTYP",
///   "timestamp_header": "A_TIMSTAMP",
///   "table_name_format": "${TableName}",
///   "table_name_case": "lower",
///   "field_name_case": "none",
///   "table_name_filter": null,
///   "field_type_overrides": { "created_at": "timestamp" },
///   "event_timestamp_policy": "best_effort"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Header carrying the source table name.
    ///
    /// Default: `"TableName"`
    pub table_header: String,

    /// Header carrying the CDC operation code.
    ///
    /// Default: `"A_ENTTYP"`
    pub operation_header: String,

    /// Optional header carrying the source commit timestamp.
    ///
    /// Its absence never makes an event corrupt.
    ///
    /// Default: `"A_TIMSTAMP"`
    pub timestamp_header: String,

    /// Target table template.
    ///
    /// `${TableName}` and `${topic}` are substituted. A format without
    /// `${TableName}` is a literal: this instance then only claims events
    /// whose table header equals the (topic-resolved) literal.
    ///
    /// Default: `"${TableName}"`
    pub table_name_format: String,

    /// Case applied to the resolved target table name.
    pub table_name_case: NameCase,

    /// Case applied to payload field names before override lookup.
    pub field_name_case: NameCase,

    /// Only claim events whose (case-normalized) table header matches this
    /// name, compared case-insensitively. `None` or blank disables the filter.
    pub table_name_filter: Option<String>,

    /// Field name (post-case) to temporal kind.
    ///
    /// Only `timestamp`, `date`, and `time` are representable, so an
    /// unsupported type fails when the configuration is loaded.
    pub field_type_overrides: BTreeMap<String, TemporalKind>,

    /// What to do when the event timestamp header cannot be parsed.
    pub event_timestamp_policy: TimestampPolicy,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            table_header: DEFAULT_TABLE_HEADER.into(),
            operation_header: DEFAULT_OPERATION_HEADER.into(),
            timestamp_header: DEFAULT_TIMESTAMP_HEADER.into(),
            table_name_format: DEFAULT_TABLE_NAME_FORMAT.into(),
            table_name_case: NameCase::None,
            field_name_case: NameCase::None,
            table_name_filter: None,
            field_type_overrides: BTreeMap::new(),
            event_timestamp_policy: TimestampPolicy::BestEffort,
        }
    }
}

impl ClassifyConfig {
    /// Validates internal consistency of this configuration.
    ///
    /// Call at start-up; a configuration that passes never produces a
    /// configuration-shaped failure at classification time.
    ///
    /// ```rust
    /// use classify::{ClassifyConfig, ConfigError};
    ///
    /// let config = ClassifyConfig {
    ///     table_name_format: " ".into(),
    ///     ..Default::default()
    /// };
    ///
    /// assert_eq!(config.validate(), Err(ConfigError::EmptyTableNameFormat));
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (option, value) in [
            ("table_header", &self.table_header),
            ("operation_header", &self.operation_header),
            ("timestamp_header", &self.timestamp_header),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyHeaderName { option });
            }
        }

        if self.table_name_format.trim().is_empty() {
            return Err(ConfigError::EmptyTableNameFormat);
        }

        for (field, kind) in &self.field_type_overrides {
            if field.trim().is_empty() {
                return Err(ConfigError::MalformedOverride {
                    entry: format!(":{kind}"),
                });
            }
        }

        Ok(())
    }

    /// The filter literal, if one is configured and not blank.
    pub fn active_table_filter(&self) -> Option<&str> {
        self.table_name_filter
            .as_deref()
            .map(str::trim)
            .filter(|filter| !filter.is_empty())
    }

    pub fn override_for(&self, field: &str) -> Option<TemporalKind> {
        self.field_type_overrides.get(field).copied()
    }
}

/// Case policy for table and field names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCase {
    Lower,
    Upper,
    #[default]
    None,
}

impl NameCase {
    pub fn apply(&self, name: &str) -> String {
        match self {
            NameCase::Lower => name.to_lowercase(),
            NameCase::Upper => name.to_uppercase(),
            NameCase::None => name.to_string(),
        }
    }
}

impl FromStr for NameCase {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lower" => Ok(NameCase::Lower),
            "upper" => Ok(NameCase::Upper),
            "none" | "" => Ok(NameCase::None),
            _ => Err(ConfigError::InvalidNameCase {
                value: value.to_string(),
            }),
        }
    }
}

/// Handling of an unparseable event timestamp header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// Carry the raw header text forward unchanged.
    #[default]
    BestEffort,
    /// Classify the event as corrupt.
    Strict,
}

/// Parses the comma-separated `field:type` override form.
///
/// Blank entries are ignored. Type names are case-insensitive; only
/// `timestamp`, `date`, and `time` are supported.
///
/// ```rust
/// use classify::{parse_field_type_overrides, TemporalKind};
///
/// let overrides = parse_field_type_overrides("created_at:timestamp, order_time:TIME,").unwrap();
/// assert_eq!(overrides.get("created_at"), Some(&TemporalKind::Timestamp));
/// assert_eq!(overrides.get("order_time"), Some(&TemporalKind::Time));
/// ```
pub fn parse_field_type_overrides(
    raw: &str,
) -> Result<BTreeMap<String, TemporalKind>, ConfigError> {
    let mut overrides = BTreeMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (field, type_name) = parse_override_entry(entry)?;
        overrides.insert(field, type_name);
    }
    Ok(overrides)
}

/// Parses one `field:type` pair.
pub fn parse_override_entry(entry: &str) -> Result<(String, TemporalKind), ConfigError> {
    let Some((field, type_name)) = entry.split_once(':') else {
        return Err(ConfigError::MalformedOverride {
            entry: entry.to_string(),
        });
    };
    let field = field.trim();
    if field.is_empty() {
        return Err(ConfigError::MalformedOverride {
            entry: entry.to_string(),
        });
    }
    let type_name = type_name.trim().to_ascii_lowercase();
    let kind = match type_name.as_str() {
        "timestamp" => TemporalKind::Timestamp,
        "date" => TemporalKind::Date,
        "time" => TemporalKind::Time,
        _ => {
            return Err(ConfigError::UnsupportedOverrideType {
                field: field.to_string(),
                type_name,
            })
        }
    };
    Ok((field.to_string(), kind))
}

/// Errors raised while building or validating a [`ClassifyConfig`].
///
/// These are start-up failures; surface them before consuming any events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{option} must not be empty")]
    EmptyHeaderName { option: &'static str },

    #[error("table_name_format must not be empty")]
    EmptyTableNameFormat,

    #[error("invalid field type override entry '{entry}'; expected field_name:type")]
    MalformedOverride { entry: String },

    #[error("unsupported type '{type_name}' for field '{field}'; supported types: timestamp, date, time")]
    UnsupportedOverrideType { field: String, type_name: String },

    #[error("invalid name case '{value}'; expected lower, upper, or none")]
    InvalidNameCase { value: String },

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ClassifyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.table_header, "TableName");
        assert_eq!(config.operation_header, "A_ENTTYP");
        assert!(config.active_table_filter().is_none());
    }

    #[test]
    fn blank_header_name_is_rejected() {
        let config = ClassifyConfig {
            operation_header: "  ".into(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyHeaderName {
                option: "operation_header"
            })
        );
    }

    #[test]
    fn override_parsing_rejects_missing_separator() {
        let err = parse_field_type_overrides("created_at").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedOverride { .. }));
    }

    #[test]
    fn override_parsing_rejects_non_temporal_types() {
        let err = parse_field_type_overrides("amount:decimal").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnsupportedOverrideType {
                field: "amount".into(),
                type_name: "decimal".into(),
            }
        );
    }

    #[test]
    fn blank_filter_is_inactive() {
        let config = ClassifyConfig {
            table_name_filter: Some("   ".into()),
            ..Default::default()
        };
        assert!(config.active_table_filter().is_none());
    }

    #[test]
    fn name_case_parses_case_insensitively() {
        assert_eq!("LOWER".parse::<NameCase>(), Ok(NameCase::Lower));
        assert_eq!("none".parse::<NameCase>(), Ok(NameCase::None));
        assert!("camel".parse::<NameCase>().is_err());
        assert_eq!(NameCase::Upper.apply("orders"), "ORDERS");
    }
}
