//! Normalization of format-specific records into the canonical schema.
//!
//! Each format declares a `FieldMap` listing the candidate source keys for
//! every canonical field, so the mapping is a table per format rather than
//! ad-hoc lookups scattered through the code. Missing fields fall back to
//! neutral values (empty string, zero, "unknown") instead of failing.

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

use crate::fingerprint;
use crate::parser::{Artifact, ArtifactKind, RawRecord, RecordOutcome};

/// Candidate source keys per canonical field, tried in order.
struct FieldMap {
    session_id: &'static [&'static str],
    timestamp: &'static [&'static str],
    content: &'static [&'static str],
    project: &'static [&'static str],
    input_tokens: &'static [&'static str],
    output_tokens: &'static [&'static str],
}

const TRANSCRIPT_FIELDS: FieldMap = FieldMap {
    session_id: &["sessionId", "id"],
    timestamp: &["timestamp", "ts"],
    content: &["content"],
    project: &["cwd", "projectPath"],
    input_tokens: &["input_tokens", "tokensIn"],
    output_tokens: &["output_tokens", "tokensOut"],
};

const PROMPT_FIELDS: FieldMap = FieldMap {
    session_id: &[],
    timestamp: &["timestamp", "ts"],
    content: &["display", "prompt"],
    project: &["project", "cwd"],
    input_tokens: &[],
    output_tokens: &[],
};

/// Tool results are truncated to this many characters when inlined into
/// message content; the full output still lands on the tool call row.
const TOOL_RESULT_PREVIEW: usize = 500;

// ============================================
// CANONICAL DRAFTS
// ============================================

/// One fully normalized session aggregate, ready for the store.
#[derive(Debug, Clone, Default)]
pub struct SessionDraft {
    pub id: String,
    pub project_path: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub model: Option<String>,
    pub total_tokens_in: i64,
    pub total_tokens_out: i64,
    pub messages: Vec<MessageDraft>,
}

impl SessionDraft {
    pub fn duration(&self) -> Option<Duration> {
        duration_between(self.started_at, self.ended_at)
    }
}

#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub sequence: i64,
    pub role: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub content: String,
    pub content_hash: String,
    pub tool_calls: Vec<ToolCallDraft>,
    pub file_changes: Vec<FileChangeDraft>,
}

#[derive(Debug, Clone)]
pub struct ToolCallDraft {
    pub sequence: i64,
    /// Source-side invocation id, used to pair results; not persisted.
    pub call_id: Option<String>,
    pub name: String,
    pub input: String,
    pub output: Option<String>,
    pub duration_ms: Option<i64>,
    pub success: bool,
}

#[derive(Debug, Clone)]
pub struct FileChangeDraft {
    pub path: String,
    pub change_type: String,
    pub diff_summary: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PromptDraft {
    pub prompt: String,
    pub project_path: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone)]
pub struct TodoDraft {
    pub content: String,
    pub status: String,
    pub sequence: i64,
}

#[derive(Debug, Clone)]
pub struct PlanDraft {
    pub name: String,
    pub title: String,
    pub content: String,
}

/// Output of a normalization pass over one artifact.
#[derive(Debug)]
pub enum Normalized {
    Session(SessionDraft),
    Prompts(Vec<PromptDraft>),
    Todos {
        session_id: String,
        items: Vec<TodoDraft>,
    },
    Plan(PlanDraft),
}

// ============================================
// ENTRY POINT
// ============================================

/// Normalize parsed records for one artifact. Skipped records are reported
/// here as warnings with enough context to find the offending line.
pub fn normalize(
    artifact: &Artifact,
    outcomes: Vec<RecordOutcome>,
    fallback_time: Option<DateTime<Utc>>,
) -> Normalized {
    let mut records = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            RecordOutcome::Record(record) => records.push(record),
            RecordOutcome::Skipped { line, reason } => {
                warn!(
                    path = %artifact.path.display(),
                    line,
                    %reason,
                    "skipping malformed record"
                );
            }
        }
    }

    match artifact.kind {
        ArtifactKind::Transcript => {
            Normalized::Session(normalize_transcript(artifact, &records, fallback_time))
        }
        ArtifactKind::PromptHistory => Normalized::Prompts(normalize_prompts(&records)),
        ArtifactKind::TodoList => {
            let (session_id, items) = normalize_todos(artifact, &records);
            Normalized::Todos { session_id, items }
        }
        ArtifactKind::Plan => Normalized::Plan(normalize_plan(artifact, &records)),
    }
}

/// Wall-clock span between two timestamps. A source whose end precedes its
/// start gets no duration, with a warning.
pub fn duration_between(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Option<Duration> {
    let (start, end) = (start?, end?);
    if end < start {
        warn!(%start, %end, "session end precedes start, treating duration as absent");
        return None;
    }
    Some(end - start)
}

// ============================================
// TRANSCRIPTS
// ============================================

fn normalize_transcript(
    artifact: &Artifact,
    records: &[RawRecord],
    fallback_time: Option<DateTime<Utc>>,
) -> SessionDraft {
    let mut draft = SessionDraft {
        id: artifact.stem(),
        ..SessionDraft::default()
    };

    // Prefer the embedded session id over the filename stem.
    if let Some(sid) = records
        .iter()
        .find_map(|r| pick_str(&r.value, TRANSCRIPT_FIELDS.session_id))
    {
        draft.id = sid.to_string();
    }

    let mut model_counts: HashMap<String, i64> = HashMap::new();
    // Tool calls awaiting their result block, keyed by invocation id.
    let mut pending_tools: HashMap<String, (usize, usize)> = HashMap::new();

    for record in records {
        let entry = &record.value;
        let entry_type = entry.get("type").and_then(Value::as_str).unwrap_or("");

        // Structural entries carry no conversation content.
        if matches!(
            entry_type,
            "queue-operation" | "summary" | "progress" | "file-history-snapshot"
        ) {
            continue;
        }

        if draft.project_path.is_none() {
            draft.project_path = pick_str(entry, TRANSCRIPT_FIELDS.project).map(String::from);
        }

        let timestamp = pick_str(entry, TRANSCRIPT_FIELDS.timestamp).and_then(parse_timestamp);
        if let Some(ts) = timestamp {
            if draft.started_at.is_none() {
                draft.started_at = Some(ts);
            }
            draft.ended_at = Some(ts);
        }

        // Claude-style entries nest the message; legacy entries are flat.
        let msg = entry.get("message").unwrap_or(entry);
        let Some(role) = canonical_role(entry_type, msg) else {
            continue;
        };

        if let Some(usage) = msg.get("usage") {
            draft.total_tokens_in += pick_i64(usage, TRANSCRIPT_FIELDS.input_tokens).unwrap_or(0);
            draft.total_tokens_out += pick_i64(usage, TRANSCRIPT_FIELDS.output_tokens).unwrap_or(0);
        }
        if let Some(model) = msg.get("model").and_then(Value::as_str) {
            *model_counts.entry(model.to_string()).or_insert(0) += 1;
        }

        let mut message = MessageDraft {
            sequence: draft.messages.len() as i64 + 1,
            role,
            timestamp,
            content: String::new(),
            content_hash: String::new(),
            tool_calls: vec![],
            file_changes: vec![],
        };

        let results = match pick(msg, TRANSCRIPT_FIELDS.content) {
            Some(Value::String(text)) => {
                message.content = text.clone();
                vec![]
            }
            Some(Value::Array(blocks)) => collect_blocks(blocks, &mut message),
            _ => vec![],
        };

        // Results complete tool calls registered by earlier messages.
        for result in results {
            if let Some((msg_idx, call_idx)) = pending_tools.remove(&result.id) {
                let call = &mut draft.messages[msg_idx].tool_calls[call_idx];
                call.output = Some(result.output);
                call.success = !result.is_error;
            }
        }

        let msg_idx = draft.messages.len();
        for (call_idx, call) in message.tool_calls.iter().enumerate() {
            if let Some(id) = &call.call_id {
                pending_tools.insert(id.clone(), (msg_idx, call_idx));
            }
        }

        message.content_hash = fingerprint::digest_str(&message.content);
        draft.messages.push(message);
    }

    draft.model = model_counts
        .into_iter()
        .max_by_key(|(_, count)| *count)
        .map(|(model, _)| model);

    if draft.project_path.is_none() {
        draft.project_path = decode_project_dir(artifact);
    }

    // No timestamped entries at all: fall back to the file's mtime so the
    // session still sorts sensibly.
    if draft.started_at.is_none() {
        draft.started_at = fallback_time;
        draft.ended_at = fallback_time;
    }

    draft
}

/// Map source roles onto the canonical set. A user entry consisting solely
/// of tool results is the transport for tool output, so it gets the "tool"
/// role. Entries with no recognizable role are not messages.
fn canonical_role(entry_type: &str, msg: &Value) -> Option<String> {
    let raw = msg
        .get("role")
        .and_then(Value::as_str)
        .unwrap_or(entry_type);

    let role = match raw {
        "user" | "human" => {
            if only_tool_results(msg) {
                "tool"
            } else {
                "user"
            }
        }
        "assistant" => "assistant",
        "system" => "system",
        "tool" | "tool_result" => "tool",
        _ => return None,
    };

    Some(role.to_string())
}

fn only_tool_results(msg: &Value) -> bool {
    match pick(msg, TRANSCRIPT_FIELDS.content) {
        Some(Value::Array(blocks)) if !blocks.is_empty() => blocks.iter().all(|b| {
            b.get("type").and_then(Value::as_str) == Some("tool_result")
        }),
        _ => false,
    }
}

struct ToolResult {
    id: String,
    output: String,
    is_error: bool,
}

/// Flatten content blocks into display text, collecting tool call drafts
/// and any tool results carried by this message.
fn collect_blocks(blocks: &[Value], message: &mut MessageDraft) -> Vec<ToolResult> {
    let mut parts: Vec<String> = vec![];
    let mut results = vec![];

    for block in blocks {
        if let Some(text) = block.as_str() {
            parts.push(text.to_string());
            continue;
        }
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    parts.push(text.to_string());
                }
            }
            Some("tool_use") => {
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                parts.push(format!("[Tool: {name}]"));

                let input = block
                    .get("input")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default()));
                if let Some(change) = file_change_for(name, &input) {
                    message.file_changes.push(change);
                }
                message.tool_calls.push(ToolCallDraft {
                    sequence: message.tool_calls.len() as i64 + 1,
                    call_id: block.get("id").and_then(Value::as_str).map(String::from),
                    name: name.to_string(),
                    input: input.to_string(),
                    output: None,
                    duration_ms: block.get("durationMs").and_then(Value::as_i64),
                    success: true,
                });
            }
            Some("tool_result") => {
                let output = tool_result_text(block);
                parts.push(format!(
                    "[Tool Result: {}]",
                    truncate(&output, TOOL_RESULT_PREVIEW)
                ));
                if let Some(id) = block.get("tool_use_id").and_then(Value::as_str) {
                    results.push(ToolResult {
                        id: id.to_string(),
                        output,
                        is_error: block.get("is_error").and_then(Value::as_bool).unwrap_or(false),
                    });
                }
            }
            _ => {}
        }
    }

    message.content = parts.join("\n");
    results
}

fn tool_result_text(block: &Value) -> String {
    match block.get("content") {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                if item.get("type").and_then(Value::as_str) == Some("text") {
                    item.get("text").and_then(Value::as_str)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

/// Tool invocations that touch files become FileChange records.
fn file_change_for(name: &str, input: &Value) -> Option<FileChangeDraft> {
    let change_type = match name {
        "Write" => "write",
        "Edit" | "MultiEdit" | "NotebookEdit" => "edit",
        _ => return None,
    };

    let path = input
        .get("file_path")
        .or_else(|| input.get("notebook_path"))?
        .as_str()?;

    let diff_summary = match (
        input.get("old_string").and_then(Value::as_str),
        input.get("new_string").and_then(Value::as_str),
    ) {
        (Some(old), Some(new)) => Some(format!(
            "-{} +{} chars",
            old.chars().count(),
            new.chars().count()
        )),
        _ => None,
    };

    Some(FileChangeDraft {
        path: path.to_string(),
        change_type: change_type.to_string(),
        diff_summary,
    })
}

/// Transcript directories encode the project path in the parent directory
/// name, e.g. `-home-dev-demo` for `/home/dev/demo`.
fn decode_project_dir(artifact: &Artifact) -> Option<String> {
    let parent = artifact.path.parent()?.file_name()?.to_str()?;
    if parent.starts_with('-') {
        Some(parent.replace('-', "/"))
    } else {
        None
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================
// PROMPT HISTORY
// ============================================

fn normalize_prompts(records: &[RawRecord]) -> Vec<PromptDraft> {
    records
        .iter()
        .filter_map(|record| {
            let entry = &record.value;
            let prompt = pick_str(entry, PROMPT_FIELDS.content)?.to_string();
            let timestamp_ms = pick_i64(entry, PROMPT_FIELDS.timestamp).unwrap_or(0);
            let timestamp = if timestamp_ms > 0 {
                Utc.timestamp_millis_opt(timestamp_ms).single()
            } else {
                None
            };
            Some(PromptDraft {
                prompt,
                project_path: pick_str(entry, PROMPT_FIELDS.project).map(String::from),
                timestamp,
                timestamp_ms,
            })
        })
        .collect()
}

// ============================================
// TODO LISTS
// ============================================

/// Todo filenames carry the owning session id up to the `-agent-` marker.
fn normalize_todos(artifact: &Artifact, records: &[RawRecord]) -> (String, Vec<TodoDraft>) {
    let stem = artifact.stem();
    let session_id = stem
        .split("-agent-")
        .next()
        .unwrap_or(&stem)
        .to_string();

    let items = records
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| {
            let value = &record.value;
            if !value.is_object() {
                return None;
            }
            Some(TodoDraft {
                content: value
                    .get("content")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| value.to_string()),
                status: value
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                sequence: idx as i64 + 1,
            })
        })
        .collect();

    (session_id, items)
}

// ============================================
// PLANS
// ============================================

fn normalize_plan(artifact: &Artifact, records: &[RawRecord]) -> PlanDraft {
    let stem = artifact.stem();
    let record = records.first().map(|r| &r.value);

    PlanDraft {
        name: stem.clone(),
        title: record
            .and_then(|v| v.get("title"))
            .and_then(Value::as_str)
            .unwrap_or(&stem)
            .to_string(),
        content: record
            .and_then(|v| v.get("content"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    }
}

// ============================================
// FIELD LOOKUP
// ============================================

fn pick<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| value.get(*key))
        .filter(|v| !v.is_null())
}

fn pick_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    pick(value, keys).and_then(Value::as_str)
}

fn pick_i64(value: &Value, keys: &[&str]) -> Option<i64> {
    pick(value, keys).and_then(Value::as_i64)
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}
