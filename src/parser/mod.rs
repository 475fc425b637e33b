//! Format parsers
//!
//! Each parser turns raw artifact bytes into a finite sequence of
//! loosely-typed records. A malformed record becomes a `Skipped` outcome
//! instead of an error, so one bad entry never aborts the artifact.
//! Everything downstream of `parse` is format-agnostic.

mod document;
mod markdown;
mod transcript;

use serde_json::Value;
use std::path::PathBuf;

/// On-disk artifact formats the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Line-delimited JSON session transcript
    Transcript,
    /// Append-only line-delimited prompt history
    PromptHistory,
    /// Whole-file JSON todo list
    TodoList,
    /// Markdown plan document
    Plan,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Transcript => "transcript",
            ArtifactKind::PromptHistory => "prompt-history",
            ArtifactKind::TodoList => "todo-list",
            ArtifactKind::Plan => "plan",
        }
    }

    /// Whether the format only ever grows at the end, making the
    /// byte-offset reread optimization safe to attempt.
    pub fn is_append_only(&self) -> bool {
        matches!(self, ArtifactKind::PromptHistory)
    }
}

/// One artifact queued for processing.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, path: PathBuf) -> Self {
        Self { kind, path }
    }

    /// Filename stem, the fallback session identifier for most formats.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string()
    }
}

/// A loosely-typed record with its source position.
#[derive(Debug)]
pub struct RawRecord {
    pub value: Value,
    /// 1-based line number for line-delimited sources; element index for
    /// whole-file formats.
    pub line: usize,
}

/// Per-record parse result. The skip path is explicit so callers have to
/// handle degraded input rather than lose it silently.
#[derive(Debug)]
pub enum RecordOutcome {
    Record(RawRecord),
    Skipped { line: usize, reason: String },
}

/// Parse raw bytes according to the artifact's format tag.
pub fn parse(kind: ArtifactKind, bytes: &[u8]) -> Vec<RecordOutcome> {
    match kind {
        ArtifactKind::Transcript | ArtifactKind::PromptHistory => transcript::parse_jsonl(bytes),
        ArtifactKind::TodoList => document::parse_json_document(bytes),
        ArtifactKind::Plan => markdown::parse_plan(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_empty_sequence() {
        for kind in [
            ArtifactKind::Transcript,
            ArtifactKind::PromptHistory,
            ArtifactKind::TodoList,
            ArtifactKind::Plan,
        ] {
            assert!(parse(kind, b"").is_empty(), "{:?}", kind);
        }
    }

    #[test]
    fn test_malformed_line_is_skipped_not_fatal() {
        let bytes = b"{\"type\":\"user\"}\nnot json at all\n{\"type\":\"assistant\"}\n";
        let outcomes = parse(ArtifactKind::Transcript, bytes);
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(outcomes[0], RecordOutcome::Record(_)));
        assert!(matches!(outcomes[1], RecordOutcome::Skipped { line: 2, .. }));
        assert!(matches!(outcomes[2], RecordOutcome::Record(_)));
    }

    #[test]
    fn test_truncated_trailing_line_dropped_with_reason() {
        let bytes = b"{\"type\":\"user\"}\n{\"type\":\"assist";
        let outcomes = parse(ArtifactKind::Transcript, bytes);
        assert_eq!(outcomes.len(), 2);
        match &outcomes[1] {
            RecordOutcome::Skipped { line, reason } => {
                assert_eq!(*line, 2);
                assert!(reason.contains("truncated"));
            }
            other => panic!("expected skip, got {:?}", other),
        }
    }
}
