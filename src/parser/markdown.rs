//! Markdown plan documents.

use super::{RawRecord, RecordOutcome};

/// Parse a Markdown plan into a single record carrying the document title
/// (first `#` heading, if any) and the verbatim body.
pub fn parse_plan(bytes: &[u8]) -> Vec<RecordOutcome> {
    let text = String::from_utf8_lossy(bytes);
    if text.trim().is_empty() {
        return vec![];
    }

    let title = text
        .lines()
        .find_map(|line| line.strip_prefix("# ").map(|t| t.trim().to_string()));

    let record = serde_json::json!({
        "title": title,
        "content": text,
    });

    vec![RecordOutcome::Record(RawRecord { value: record, line: 1 })]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_from_first_heading() {
        let outcomes = parse_plan(b"intro\n# Refactor the scanner\n\nsteps\n# Later heading\n");
        let RecordOutcome::Record(record) = &outcomes[0] else {
            panic!("expected record");
        };
        assert_eq!(
            record.value["title"].as_str(),
            Some("Refactor the scanner")
        );
        assert!(record.value["content"]
            .as_str()
            .unwrap()
            .contains("Later heading"));
    }

    #[test]
    fn test_untitled_document_has_null_title() {
        let outcomes = parse_plan(b"just notes\n");
        let RecordOutcome::Record(record) = &outcomes[0] else {
            panic!("expected record");
        };
        assert!(record.value["title"].is_null());
    }
}
