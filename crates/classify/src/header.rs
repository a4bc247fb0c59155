//! Header lookup and required-header validation.
//!
//! All lookups read the *last* header carrying the configured name and decode
//! byte values as UTF-8. Nothing here has state beyond the configured names.
use crate::config::ClassifyConfig;
use crate::error::ClassifyError;
use crate::types::Event;

/// Reads the table, operation, and timestamp headers of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderExtractor {
    table_header: String,
    operation_header: String,
    timestamp_header: String,
}

impl HeaderExtractor {
    pub fn new(
        table_header: impl Into<String>,
        operation_header: impl Into<String>,
        timestamp_header: impl Into<String>,
    ) -> Self {
        Self {
            table_header: table_header.into(),
            operation_header: operation_header.into(),
            timestamp_header: timestamp_header.into(),
        }
    }

    pub fn from_config(config: &ClassifyConfig) -> Self {
        Self::new(
            config.table_header.clone(),
            config.operation_header.clone(),
            config.timestamp_header.clone(),
        )
    }

    pub fn table_header(&self) -> &str {
        &self.table_header
    }

    pub fn operation_header(&self) -> &str {
        &self.operation_header
    }

    /// Fails when the table or operation header is absent or blank.
    ///
    /// The timestamp header is optional and never checked here.
    pub fn validate_required_headers(&self, event: &Event) -> Result<(), ClassifyError> {
        for header in [&self.table_header, &self.operation_header] {
            let present = extract(event, header).is_some_and(|value| !value.trim().is_empty());
            if !present {
                return Err(ClassifyError::MissingHeader {
                    header: header.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn extract_table_name(&self, event: &Event) -> Option<String> {
        extract(event, &self.table_header)
    }

    pub fn extract_operation_code(&self, event: &Event) -> Option<String> {
        extract(event, &self.operation_header)
    }

    pub fn extract_timestamp(&self, event: &Event) -> Option<String> {
        extract(event, &self.timestamp_header)
    }
}

/// Last value of header `name` as text.
pub fn extract(event: &Event, name: &str) -> Option<String> {
    event
        .headers
        .last_with_name(name)
        .and_then(|value| value.as_text())
        .map(|text| text.into_owned())
}
