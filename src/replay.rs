//! JSON-lines event input for offline replay.
//!
//! One event per line:
//!
//! ```json
//! {"topic":"journal","partition":0,"offset":7,"key":{"ID":1},"value":{"ID":1,"STATUS":"NEW"},
//!  "headers":[{"name":"TableName","value":"ORDERS"},{"name":"A_ENTTYP","value":[80,84]}]}
//! ```
//!
//! A header value is a string, an array of bytes, or `null`.
use std::io::BufRead;

use classify::{Event, Header, Headers};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read events: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Wire form of one replayed event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventLine {
    pub topic: String,
    #[serde(default)]
    pub partition: i32,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub key: Option<serde_json::Value>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub headers: Vec<Header>,
}

impl EventLine {
    pub fn into_event(self) -> Event {
        let mut event = Event::new(self.topic, self.partition, self.offset);
        event.key = self.key.map(Into::into);
        event.value = self.value.map(Into::into);
        event.headers = Headers::from(self.headers);
        event
    }
}

/// Reads every non-blank line of `reader` as an [`EventLine`].
pub fn read_events<R: BufRead>(reader: R) -> Result<Vec<Event>, ReplayError> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: EventLine =
            serde_json::from_str(&line).map_err(|source| ReplayError::Parse {
                line: index + 1,
                source,
            })?;
        events.push(parsed.into_event());
    }
    Ok(events)
}
