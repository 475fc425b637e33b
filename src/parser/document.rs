//! Whole-file JSON documents (todo lists).

use serde_json::Value;

use super::{RawRecord, RecordOutcome};

/// Parse a single JSON document into records.
///
/// Top-level arrays yield one record per element (the todo-list shape);
/// any other valid document becomes a single record. An undecodable file
/// yields one `Skipped` outcome rather than an error.
pub fn parse_json_document(bytes: &[u8]) -> Vec<RecordOutcome> {
    let text = String::from_utf8_lossy(bytes);
    if text.trim().is_empty() {
        return vec![];
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .map(|(idx, value)| RecordOutcome::Record(RawRecord { value, line: idx + 1 }))
            .collect(),
        Ok(value) => vec![RecordOutcome::Record(RawRecord { value, line: 1 })],
        Err(err) => vec![RecordOutcome::Skipped {
            line: 1,
            reason: format!("invalid JSON document: {err}"),
        }],
    }
}
