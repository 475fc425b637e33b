//! Line-delimited JSON parsing, shared by session transcripts and the
//! prompt history file.

use serde_json::Value;

use super::{RawRecord, RecordOutcome};

/// Parse JSONL bytes into one outcome per non-blank line.
///
/// A line that fails to parse is skipped with a reason. If the file does
/// not end in a newline, its final line is treated as a truncated write in
/// progress and dropped; complete earlier lines are retained.
pub fn parse_jsonl(bytes: &[u8]) -> Vec<RecordOutcome> {
    if bytes.is_empty() {
        return vec![];
    }

    let text = String::from_utf8_lossy(bytes);
    let terminated = text.ends_with('\n');

    let mut lines: Vec<&str> = text.split('\n').collect();
    if terminated {
        // split leaves one empty element after the final newline
        lines.pop();
    }
    let last = lines.len().saturating_sub(1);

    let mut outcomes = Vec::with_capacity(lines.len());
    for (idx, raw) in lines.iter().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => outcomes.push(RecordOutcome::Record(RawRecord {
                value,
                line: idx + 1,
            })),
            Err(err) => {
                let reason = if idx == last && !terminated {
                    "truncated trailing line".to_string()
                } else {
                    format!("invalid JSON: {err}")
                };
                outcomes.push(RecordOutcome::Skipped {
                    line: idx + 1,
                    reason,
                });
            }
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lines_are_ignored() {
        let outcomes = parse_jsonl(b"{\"a\":1}\n\n\n{\"b\":2}\n");
        assert_eq!(outcomes.len(), 2);
    }

    #[test]
    fn test_line_numbers_survive_blank_lines() {
        let outcomes = parse_jsonl(b"\n{\"a\":1}\n");
        match &outcomes[0] {
            RecordOutcome::Record(r) => assert_eq!(r.line, 2),
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_unterminated_but_valid_final_line_is_kept() {
        // A complete JSON object without a trailing newline still parses.
        let outcomes = parse_jsonl(b"{\"a\":1}\n{\"b\":2}");
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[1], RecordOutcome::Record(_)));
    }
}
