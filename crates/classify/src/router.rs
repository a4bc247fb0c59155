//! Target table resolution and instance ownership.
//!
//! Several pipeline instances may consume the same topic. A format with the
//! `${TableName}` placeholder claims every event (template mode). A format
//! without it is a literal naming the one table this instance owns.
use crate::config::{ClassifyConfig, NameCase};
use crate::header;
use crate::types::Event;

pub const TABLE_NAME_PLACEHOLDER: &str = "${TableName}";
pub const TOPIC_PLACEHOLDER: &str = "${topic}";

/// Decides which events this instance owns and where they are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRouter {
    table_name_format: String,
    table_name_case: NameCase,
    table_name_filter: Option<String>,
    table_header: String,
}

impl TableRouter {
    pub fn new(table_name_format: impl Into<String>, table_header: impl Into<String>) -> Self {
        Self {
            table_name_format: table_name_format.into(),
            table_name_case: NameCase::None,
            table_name_filter: None,
            table_header: table_header.into(),
        }
    }

    pub fn from_config(config: &ClassifyConfig) -> Self {
        Self {
            table_name_format: config.table_name_format.clone(),
            table_name_case: config.table_name_case,
            table_name_filter: config.active_table_filter().map(str::to_string),
            table_header: config.table_header.clone(),
        }
    }

    pub fn with_table_name_case(mut self, case: NameCase) -> Self {
        self.table_name_case = case;
        self
    }

    pub fn with_table_name_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        let filter = filter.trim();
        self.table_name_filter = (!filter.is_empty()).then(|| filter.to_string());
        self
    }

    pub fn is_template_mode(&self) -> bool {
        self.table_name_format.contains(TABLE_NAME_PLACEHOLDER)
    }

    /// Whether this instance owns `event`.
    ///
    /// An event without a table header is owned in template mode so that
    /// classification can report it; a literal-mode instance cannot tell
    /// and leaves it to the instance that owns everything else.
    ///
    /// ```rust
    /// use classify::{Event, TableRouter};
    ///
    /// let router = TableRouter::new("ORDERS", "TableName");
    /// let orders = Event::new("cdc", 0, 1).with_header("TableName", "ORDERS");
    /// let customers = Event::new("cdc", 0, 2).with_header("TableName", "CUSTOMERS");
    ///
    /// assert!(router.should_process(&orders));
    /// assert!(!router.should_process(&customers));
    /// ```
    pub fn should_process(&self, event: &Event) -> bool {
        let table = header::extract(event, &self.table_header);

        if let (Some(filter), Some(table)) = (&self.table_name_filter, &table) {
            let table = self.table_name_case.apply(table.trim());
            if !filter.eq_ignore_ascii_case(&table) {
                return false;
            }
        }

        if self.is_template_mode() {
            return true;
        }

        match table {
            Some(table) => {
                self.table_name_format
                    .replace(TOPIC_PLACEHOLDER, &event.topic)
                    == table
            }
            None => false,
        }
    }

    /// Substitutes both placeholders, then applies the table name case.
    ///
    /// Missing inputs substitute as the empty string.
    pub fn resolve_target_table(&self, table_name: Option<&str>, topic: Option<&str>) -> String {
        let resolved = self
            .table_name_format
            .replace(TABLE_NAME_PLACEHOLDER, table_name.unwrap_or_default())
            .replace(TOPIC_PLACEHOLDER, topic.unwrap_or_default());
        self.table_name_case.apply(&resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(table: &str) -> Event {
        Event::new("topicA", 0, 0).with_header("TableName", table)
    }

    #[test]
    fn resolves_table_and_topic_placeholders() {
        let router = TableRouter::new("${TableName}_sink", "TableName");
        assert_eq!(
            router.resolve_target_table(Some("ORDERS"), Some("topicA")),
            "ORDERS_sink"
        );

        let router = TableRouter::new("${topic}", "TableName");
        assert_eq!(
            router.resolve_target_table(Some("ORDERS"), Some("topicA")),
            "topicA"
        );
    }

    #[test]
    fn missing_inputs_resolve_to_empty() {
        let router = TableRouter::new("${topic}_${TableName}", "TableName");
        assert_eq!(router.resolve_target_table(None, None), "_");
    }

    #[test]
    fn case_applies_to_resolved_name() {
        let router =
            TableRouter::new("Stage_${TableName}", "TableName").with_table_name_case(NameCase::Lower);
        assert_eq!(
            router.resolve_target_table(Some("ORDERS"), None),
            "stage_orders"
        );
    }

    #[test]
    fn literal_mode_claims_only_its_table() {
        let router = TableRouter::new("ORDERS", "TableName");
        assert!(!router.is_template_mode());
        assert!(router.should_process(&event("ORDERS")));
        assert!(!router.should_process(&event("CUSTOMERS")));
        assert!(!router.should_process(&event("orders")));
        assert!(!router.should_process(&Event::new("topicA", 0, 0)));
    }

    #[test]
    fn literal_mode_resolves_topic_placeholder() {
        let router = TableRouter::new("${topic}_ORDERS", "TableName");
        assert!(router.should_process(&event("topicA_ORDERS")));
        assert!(!router.should_process(&event("ORDERS")));
    }

    #[test]
    fn template_mode_claims_everything_including_headerless() {
        let router = TableRouter::new("${TableName}", "TableName");
        assert!(router.should_process(&event("ANYTHING")));
        assert!(router.should_process(&Event::new("topicA", 0, 0)));
    }

    #[test]
    fn filter_compares_case_insensitively() {
        let router = TableRouter::new("${TableName}", "TableName")
            .with_table_name_case(NameCase::Upper)
            .with_table_name_filter("orders");
        assert!(router.should_process(&event("Orders")));
        assert!(!router.should_process(&event("CUSTOMERS")));
    }

    #[test]
    fn blank_filter_is_ignored() {
        let router = TableRouter::new("${TableName}", "TableName").with_table_name_filter("  ");
        assert!(router.should_process(&event("CUSTOMERS")));
    }
}
