//! Batch grouping.
//!
//! Classifies every event of a batch independently and partitions the
//! outcomes into per-table record sequences plus one corrupt sequence. Tables
//! appear in the order they are first seen; records keep batch order within
//! their table.
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use classify::{ClassificationOutcome, CorruptRecord, Event, RecordClassifier, RoutedRecord};
use tracing::error;

/// Reason prefix for an event whose classification panicked.
pub const PROCESSING_ERROR: &str = "processing error";

/// Routed records destined for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableGroup {
    pub table: String,
    pub records: Vec<RoutedRecord>,
}

/// Outcome of grouping one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedBatch {
    groups: Vec<TableGroup>,
    index: HashMap<String, usize>,
    corrupt: Vec<CorruptRecord>,
    skipped: usize,
}

impl GroupedBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one outcome into the batch.
    pub fn push(&mut self, outcome: ClassificationOutcome) {
        match outcome {
            ClassificationOutcome::Routed(record) => {
                match self.index.get(&record.target_table) {
                    Some(&slot) => self.groups[slot].records.push(record),
                    None => {
                        self.index
                            .insert(record.target_table.clone(), self.groups.len());
                        self.groups.push(TableGroup {
                            table: record.target_table.clone(),
                            records: vec![record],
                        });
                    }
                }
            }
            ClassificationOutcome::Corrupt(record) => self.corrupt.push(record),
            ClassificationOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Table groups in first-seen order.
    pub fn groups(&self) -> &[TableGroup] {
        &self.groups
    }

    pub fn group(&self, table: &str) -> Option<&TableGroup> {
        self.index.get(table).map(|&slot| &self.groups[slot])
    }

    pub fn corrupt(&self) -> &[CorruptRecord] {
        &self.corrupt
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn routed(&self) -> usize {
        self.groups.iter().map(|group| group.records.len()).sum()
    }
}

impl FromIterator<ClassificationOutcome> for GroupedBatch {
    fn from_iter<I: IntoIterator<Item = ClassificationOutcome>>(iter: I) -> Self {
        let mut batch = GroupedBatch::new();
        for outcome in iter {
            batch.push(outcome);
        }
        batch
    }
}

/// Runs a [`RecordClassifier`] over a batch.
#[derive(Debug, Clone)]
pub struct BatchGrouper {
    classifier: RecordClassifier,
}

impl BatchGrouper {
    pub fn new(classifier: RecordClassifier) -> Self {
        Self { classifier }
    }

    /// Classifies and groups `events`.
    ///
    /// A panic while classifying one event is contained: the event becomes a
    /// corrupt record with a `processing error` reason and the rest of the
    /// batch is unaffected.
    pub fn group(&self, events: &[Event]) -> GroupedBatch {
        self.group_with(events, |event| self.classifier.classify(event))
    }

    fn group_with<F>(&self, events: &[Event], classify: F) -> GroupedBatch
    where
        F: Fn(&Event) -> ClassificationOutcome,
    {
        events
            .iter()
            .map(|event| classify_contained(event, &classify))
            .collect()
    }
}

fn classify_contained<F>(event: &Event, classify: &F) -> ClassificationOutcome
where
    F: Fn(&Event) -> ClassificationOutcome,
{
    match panic::catch_unwind(AssertUnwindSafe(|| classify(event))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                topic = %event.topic,
                partition = event.partition,
                offset = event.offset,
                error = %message,
                "classification_panicked"
            );
            ClassificationOutcome::Corrupt(CorruptRecord::new(
                event.clone(),
                format!("{PROCESSING_ERROR}: {message}"),
            ))
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
