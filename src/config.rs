//! YAML configuration file support for cdcroute.
//!
//! One file describes a pipeline instance: how events are classified and what
//! happens to corrupt ones. Everything is validated when the file is loaded,
//! so a pipeline that starts never fails on configuration later.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "orders sink"
//!
//! classify:
//!   table_header: "TableName"
//!   operation_header: "A_ENTTYP"
//!   timestamp_header: "A_TIMSTAMP"
//!   table_name_format: "${TableName}"
//!   table_name_case: "lower"
//!   field_name_case: "lower"
//!   table_name_filter: ""
//!   field_type_overrides:
//!     - "created_at:timestamp"
//!     - "order_date:date"
//!   event_timestamp_policy: "best_effort"
//!
//! errors:
//!   tolerance: "log"
//!   quarantine:
//!     enabled: true
//!     table: "cdc_corrupt_events"
//! ```
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use classify::{
    ClassifyConfig, ConfigError, DEFAULT_OPERATION_HEADER, DEFAULT_TABLE_HEADER,
    DEFAULT_TABLE_NAME_FORMAT, DEFAULT_TIMESTAMP_HEADER, NameCase, TemporalKind, TimestampPolicy,
    parse_field_type_overrides, parse_override_entry,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::ErrorTolerance;
use crate::sink::DEFAULT_QUARANTINE_TABLE;

/// Environment variable overriding `errors.tolerance`.
pub const ENV_TOLERANCE: &str = "CDCROUTE_TOLERANCE";
/// Environment variable overriding `classify.table_name_format`.
pub const ENV_TABLE_NAME_FORMAT: &str = "CDCROUTE_TABLE_NAME_FORMAT";

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("invalid classify section: {0}")]
    Classify(#[from] ConfigError),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid value for {name}: {message}")]
    InvalidEnv { name: &'static str, message: String },
}

/// Top-level YAML configuration for one pipeline instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SinkConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Classification configuration
    #[serde(default)]
    pub classify: ClassifyYamlConfig,

    /// Corrupt-record handling
    #[serde(default)]
    pub errors: ErrorsYamlConfig,
}

impl SinkConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: SinkConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.classify_config()?;
        self.errors.validate()?;

        Ok(())
    }

    /// Builds the validated runtime classification config.
    pub fn classify_config(&self) -> Result<ClassifyConfig, ConfigLoadError> {
        let config = self.classify.to_classify_config()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies [`ENV_TOLERANCE`] and [`ENV_TABLE_NAME_FORMAT`] from the
    /// process environment, then re-validates.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigLoadError> {
        self.apply_overrides_with(|name| std::env::var(name).ok())
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// explicit lookup.
    pub fn apply_overrides_with<F>(&mut self, lookup: F) -> Result<(), ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(tolerance) = lookup(ENV_TOLERANCE) {
            self.errors.tolerance = tolerance.parse::<ErrorTolerance>().map_err(|err| {
                ConfigLoadError::InvalidEnv {
                    name: ENV_TOLERANCE,
                    message: err.to_string(),
                }
            })?;
        }
        if let Some(format) = lookup(ENV_TABLE_NAME_FORMAT) {
            self.classify.table_name_format = format;
        }
        self.validate()
    }

    /// Quarantine table, when quarantine is enabled.
    pub fn quarantine_table(&self) -> Option<&str> {
        self.errors
            .quarantine
            .enabled
            .then_some(self.errors.quarantine.table.as_str())
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            classify: ClassifyYamlConfig::default(),
            errors: ErrorsYamlConfig::default(),
        }
    }
}

/// Classification YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyYamlConfig {
    #[serde(default = "default_table_header")]
    pub table_header: String,

    #[serde(default = "default_operation_header")]
    pub operation_header: String,

    #[serde(default = "default_timestamp_header")]
    pub timestamp_header: String,

    #[serde(default = "default_table_name_format")]
    pub table_name_format: String,

    #[serde(default)]
    pub table_name_case: NameCase,

    #[serde(default)]
    pub field_name_case: NameCase,

    /// Blank means no filter
    #[serde(default)]
    pub table_name_filter: Option<String>,

    #[serde(default)]
    pub field_type_overrides: FieldTypeOverrides,

    #[serde(default)]
    pub event_timestamp_policy: TimestampPolicy,
}

impl ClassifyYamlConfig {
    fn to_classify_config(&self) -> Result<ClassifyConfig, ConfigError> {
        Ok(ClassifyConfig {
            table_header: self.table_header.clone(),
            operation_header: self.operation_header.clone(),
            timestamp_header: self.timestamp_header.clone(),
            table_name_format: self.table_name_format.clone(),
            table_name_case: self.table_name_case,
            field_name_case: self.field_name_case,
            table_name_filter: self.table_name_filter.clone(),
            field_type_overrides: self.field_type_overrides.resolve()?,
            event_timestamp_policy: self.event_timestamp_policy,
        })
    }
}

impl Default for ClassifyYamlConfig {
    fn default() -> Self {
        Self {
            table_header: default_table_header(),
            operation_header: default_operation_header(),
            timestamp_header: default_timestamp_header(),
            table_name_format: default_table_name_format(),
            table_name_case: NameCase::None,
            field_name_case: NameCase::None,
            table_name_filter: None,
            field_type_overrides: FieldTypeOverrides::default(),
            event_timestamp_policy: TimestampPolicy::BestEffort,
        }
    }
}

/// `field:type` overrides, as a YAML list or one comma-separated string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldTypeOverrides {
    List(Vec<String>),
    Inline(String),
}

impl FieldTypeOverrides {
    pub fn resolve(&self) -> Result<BTreeMap<String, TemporalKind>, ConfigError> {
        match self {
            FieldTypeOverrides::Inline(raw) => parse_field_type_overrides(raw),
            FieldTypeOverrides::List(entries) => entries
                .iter()
                .map(|entry| entry.trim())
                .filter(|entry| !entry.is_empty())
                .map(parse_override_entry)
                .collect(),
        }
    }
}

impl Default for FieldTypeOverrides {
    fn default() -> Self {
        FieldTypeOverrides::List(Vec::new())
    }
}

/// Corrupt-record handling YAML configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorsYamlConfig {
    #[serde(default)]
    pub tolerance: ErrorTolerance,

    #[serde(default)]
    pub quarantine: QuarantineYamlConfig,
}

impl ErrorsYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.quarantine.enabled && self.quarantine.table.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "errors.quarantine.table must not be empty when quarantine is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Quarantine table YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineYamlConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_quarantine_table")]
    pub table: String,
}

impl Default for QuarantineYamlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            table: default_quarantine_table(),
        }
    }
}

// Default value functions
fn default_table_header() -> String {
    DEFAULT_TABLE_HEADER.to_string()
}
fn default_operation_header() -> String {
    DEFAULT_OPERATION_HEADER.to_string()
}
fn default_timestamp_header() -> String {
    DEFAULT_TIMESTAMP_HEADER.to_string()
}
fn default_table_name_format() -> String {
    DEFAULT_TABLE_NAME_FORMAT.to_string()
}
fn default_quarantine_table() -> String {
    DEFAULT_QUARANTINE_TABLE.to_string()
}
