//! End-to-end scan pass tests over a fixture log directory.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use logbook::config::Config;
use logbook::scanner::Scanner;
use logbook::store::SessionStore;

const LINE_USER: &str = r#"{"type":"user","sessionId":"sess-0001","timestamp":"2026-01-15T10:00:00Z","cwd":"/home/dev/demo","message":{"role":"user","content":"Fix the error in the parser please"}}"#;
const LINE_ASSISTANT: &str = r#"{"type":"assistant","timestamp":"2026-01-15T10:00:05Z","message":{"role":"assistant","model":"sonnet-4","usage":{"input_tokens":120,"output_tokens":80},"content":[{"type":"text","text":"Looking at it."},{"type":"tool_use","id":"tu1","name":"Edit","input":{"file_path":"src/parser.rs","old_string":"bad","new_string":"good"}}]}}"#;
const LINE_TOOL_RESULT: &str = r#"{"type":"user","timestamp":"2026-01-15T10:00:09Z","message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"tu1","content":"edited"}]}}"#;
const LINE_TRUNCATED: &str = r#"{"type":"assistant","mess"#;

const LINE_FOLLOWUP_USER: &str = r#"{"type":"user","timestamp":"2026-01-15T10:01:00Z","message":{"role":"user","content":"Now add a regression test"}}"#;
const LINE_FOLLOWUP_ASSISTANT: &str = r#"{"type":"assistant","timestamp":"2026-01-15T10:01:10Z","message":{"role":"assistant","model":"sonnet-4","usage":{"input_tokens":60,"output_tokens":40},"content":[{"type":"text","text":"Done."}]}}"#;

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    store: Arc<SessionStore>,
    scanner: Arc<Scanner>,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("logs");
    fs::create_dir_all(root.join("projects/-home-dev-demo")).unwrap();
    fs::create_dir_all(root.join("plans")).unwrap();
    fs::create_dir_all(root.join("todos")).unwrap();

    let mut config = Config::default();
    config.scan.root = root.to_string_lossy().into_owned();
    config.scan.workers = 2;

    let store = Arc::new(SessionStore::open(&dir.path().join("logbook.db")).unwrap());
    let scanner = Arc::new(Scanner::new(config, Arc::clone(&store)).unwrap());

    Fixture {
        _dir: dir,
        root,
        store,
        scanner,
    }
}

fn transcript_path(root: &Path) -> PathBuf {
    root.join("projects/-home-dev-demo/sess-0001.jsonl")
}

fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

async fn pass(fx: &Fixture) -> logbook::scanner::PassSummary {
    Arc::clone(&fx.scanner).run_pass().await
}

#[tokio::test]
async fn test_transcript_import_reimport_and_append() {
    let fx = fixture();
    let transcript = transcript_path(&fx.root);

    // 3 well-formed messages plus a truncated trailing line.
    fs::write(
        &transcript,
        format!("{LINE_USER}\n{LINE_ASSISTANT}\n{LINE_TOOL_RESULT}\n{LINE_TRUNCATED}"),
    )
    .unwrap();

    let summary = pass(&fx).await;
    assert_eq!(summary.imported, 1);
    assert_eq!(summary.errors, 0);

    let session = fx.store.get_session("sess-0001").unwrap().unwrap();
    assert_eq!(session.total_messages, 3);
    assert_eq!(session.total_tokens_in, 120);
    assert_eq!(session.total_tokens_out, 80);
    assert_eq!(session.model.as_deref(), Some("sonnet-4"));
    assert_eq!(session.project_path.as_deref(), Some("/home/dev/demo"));

    let first_import = fx.store.get_messages("sess-0001").unwrap();
    assert_eq!(first_import.len(), 3);
    assert_eq!(first_import[0].role, "user");
    assert_eq!(first_import[1].role, "assistant");
    assert_eq!(first_import[2].role, "tool");

    // The tool result completed the Edit call.
    let calls = fx.store.get_tool_calls("sess-0001").unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tool_name, "Edit");
    assert_eq!(calls[0].tool_output.as_deref(), Some("edited"));
    assert!(calls[0].success);

    // Keyword and tool-usage tags fired.
    let tags = fx.store.get_tags("sess-0001").unwrap();
    assert!(tags.iter().any(|t| t.tag == "debugging" && t.auto_generated));
    assert!(tags.iter().any(|t| t.tag == "tool:Edit"));

    // Fingerprint recorded for the transcript path.
    let key = transcript.to_string_lossy().into_owned();
    assert!(fx.store.fingerprint(&key).unwrap().is_some());

    // Unchanged reimport: nothing touches the store.
    let summary = pass(&fx).await;
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.unchanged, 1);
    let stats = fx.store.stats().unwrap();
    assert_eq!(stats.messages, 3);

    // Append two well-formed lines. The leading newline completes the
    // previously truncated line, which now parses as garbage and is
    // skipped, so earlier sequences are untouched.
    append(
        &transcript,
        &format!("\n{LINE_FOLLOWUP_USER}\n{LINE_FOLLOWUP_ASSISTANT}\n"),
    );
    let summary = pass(&fx).await;
    assert_eq!(summary.imported, 1);

    let second_import = fx.store.get_messages("sess-0001").unwrap();
    assert_eq!(second_import.len(), 5);

    // Previously assigned sequences, row ids and content are all stable.
    for (before, after) in first_import.iter().zip(&second_import) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.sequence, after.sequence);
        assert_eq!(before.content, after.content);
        assert_eq!(before.content_hash, after.content_hash);
    }
    assert_eq!(second_import[3].sequence, 4);
    assert_eq!(second_import[4].sequence, 5);

    // Token totals now cover the appended assistant turn.
    let session = fx.store.get_session("sess-0001").unwrap().unwrap();
    assert_eq!(session.total_messages, 5);
    assert_eq!(session.total_tokens_in, 180);
    assert_eq!(session.total_tokens_out, 120);
}

#[tokio::test]
async fn test_manual_tag_survives_reimport() {
    let fx = fixture();
    let transcript = transcript_path(&fx.root);
    fs::write(&transcript, format!("{LINE_USER}\n")).unwrap();

    pass(&fx).await;
    fx.store.add_tag("sess-0001", "keeper", false).unwrap();

    // Change the artifact so the session actually reprocesses; the new
    // content no longer matches "keeper"'s absence of keywords either way.
    append(&transcript, &format!("{LINE_FOLLOWUP_ASSISTANT}\n"));
    pass(&fx).await;

    let tags = fx.store.get_tags("sess-0001").unwrap();
    let keeper = tags.iter().find(|t| t.tag == "keeper").unwrap();
    assert!(!keeper.auto_generated);
}

#[tokio::test]
async fn test_prompt_history_append_and_rotation() {
    let fx = fixture();
    let history = fx.root.join("history.jsonl");
    fs::write(
        &history,
        concat!(
            r#"{"display":"build a parser","project":"/home/dev/demo","timestamp":1000}"#,
            "\n",
            r#"{"display":"add tests","project":"/home/dev/demo","timestamp":2000}"#,
            "\n",
        ),
    )
    .unwrap();

    pass(&fx).await;
    assert_eq!(fx.store.stats().unwrap().prompts, 2);

    // Pure append: only the tail is parsed and imported.
    append(
        &history,
        "{\"display\":\"wire up the scanner\",\"timestamp\":3000}\n",
    );
    pass(&fx).await;
    assert_eq!(fx.store.stats().unwrap().prompts, 3);

    // Rotation: the file is rewritten from scratch. Full reparse, and the
    // timestamp guard keeps already-imported entries from duplicating.
    fs::write(
        &history,
        concat!(
            r#"{"display":"add tests","project":"/home/dev/demo","timestamp":2000}"#,
            "\n",
            r#"{"display":"brand new prompt","timestamp":4000}"#,
            "\n",
        ),
    )
    .unwrap();
    pass(&fx).await;
    assert_eq!(fx.store.stats().unwrap().prompts, 4);
}

#[tokio::test]
async fn test_plan_and_todo_import() {
    let fx = fixture();
    fs::write(
        fx.root.join("plans/rework.md"),
        "# Rework the scanner\n\n- split discovery\n",
    )
    .unwrap();
    fs::write(
        fx.root.join("todos/sess-0001-agent-sess-0001.json"),
        r#"[{"content":"write tests","status":"pending"},{"content":"ship it","status":"completed"}]"#,
    )
    .unwrap();

    pass(&fx).await;

    let plan = fx.store.get_plan("rework").unwrap().unwrap();
    assert_eq!(plan.title.as_deref(), Some("Rework the scanner"));

    let todos = fx.store.get_todos("sess-0001").unwrap();
    assert_eq!(todos.len(), 2);
    assert_eq!(todos[0].content.as_deref(), Some("write tests"));

    // Rewriting the plan updates it in place instead of duplicating.
    fs::write(
        fx.root.join("plans/rework.md"),
        "# Rework the scanner\n\n- split discovery\n- bound the pool\n",
    )
    .unwrap();
    // The todo file shrinks to one open item.
    fs::write(
        fx.root.join("todos/sess-0001-agent-sess-0001.json"),
        r#"[{"content":"ship it","status":"in_progress"}]"#,
    )
    .unwrap();
    pass(&fx).await;

    let stats = fx.store.stats().unwrap();
    assert_eq!(stats.plans, 1);
    assert_eq!(stats.todos, 1);
    let plan = fx.store.get_plan("rework").unwrap().unwrap();
    assert!(plan.content.unwrap().contains("bound the pool"));
}

#[tokio::test]
async fn test_full_scan_twice_is_idempotent() {
    let fx = fixture();
    fs::write(
        transcript_path(&fx.root),
        format!("{LINE_USER}\n{LINE_ASSISTANT}\n"),
    )
    .unwrap();
    fs::write(
        fx.root.join("history.jsonl"),
        "{\"display\":\"hello\",\"timestamp\":1000}\n",
    )
    .unwrap();
    fs::write(fx.root.join("plans/p1.md"), "# P1\nbody\n").unwrap();
    fs::write(
        fx.root.join("todos/sess-0001-agent-a.json"),
        r#"[{"content":"x","status":"pending"}]"#,
    )
    .unwrap();

    let first = pass(&fx).await;
    assert_eq!(first.imported, 4);
    let before = fx.store.stats().unwrap();

    let second = pass(&fx).await;
    assert_eq!(second.imported, 0);
    assert_eq!(second.unchanged, 4);
    assert_eq!(second.errors, 0);

    let after = fx.store.stats().unwrap();
    assert_eq!(before.sessions, after.sessions);
    assert_eq!(before.messages, after.messages);
    assert_eq!(before.tool_calls, after.tool_calls);
    assert_eq!(before.prompts, after.prompts);
    assert_eq!(before.plans, after.plans);
    assert_eq!(before.todos, after.todos);
}

#[tokio::test]
async fn test_search_after_import() {
    let fx = fixture();
    fs::write(
        transcript_path(&fx.root),
        format!("{LINE_USER}\n{LINE_ASSISTANT}\n"),
    )
    .unwrap();

    pass(&fx).await;

    let hits = fx.store.search_messages("parser", 10).unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].session_id, "sess-0001");

    let payload = fx.store.session_payload("sess-0001", false).unwrap().unwrap();
    assert_eq!(payload.project_name.as_deref(), Some("demo"));
    assert!(payload.messages.is_none());
    assert_eq!(payload.tools.get("Edit").unwrap().count, 1);
}
