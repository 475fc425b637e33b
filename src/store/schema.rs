//! SQLite schema definition.
//!
//! The FTS5 tables are external-content indexes over messages and prompt
//! history, kept in sync by triggers so index maintenance rides inside the
//! same transaction as the row writes.

pub const SCHEMA: &str = r#"
-- ============================================
-- SESSIONS
-- ============================================

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    project_path TEXT,
    started_at TEXT,
    ended_at TEXT,
    model TEXT,
    total_messages INTEGER NOT NULL DEFAULT 0,
    total_tokens_in INTEGER NOT NULL DEFAULT 0,
    total_tokens_out INTEGER NOT NULL DEFAULT 0,
    imported_at TEXT
);

-- ============================================
-- MESSAGES
-- ============================================

-- Messages are immutable once recorded; (session_id, sequence) keys the
-- insert-or-ignore on reimport.
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY,
    session_id TEXT NOT NULL,
    sequence INTEGER NOT NULL CHECK (sequence >= 0),
    timestamp TEXT,
    role TEXT NOT NULL,
    content TEXT,
    content_hash TEXT,
    UNIQUE(session_id, sequence),
    FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

-- ============================================
-- TOOL CALLS & FILE CHANGES
-- ============================================

CREATE TABLE IF NOT EXISTS tool_calls (
    id INTEGER PRIMARY KEY,
    message_id INTEGER NOT NULL,
    sequence INTEGER NOT NULL CHECK (sequence >= 0),
    tool_name TEXT NOT NULL,
    tool_input TEXT,
    tool_output TEXT,
    duration_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY(message_id) REFERENCES messages(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS file_changes (
    id INTEGER PRIMARY KEY,
    session_id TEXT NOT NULL,
    message_id INTEGER,
    file_path TEXT NOT NULL,
    change_type TEXT,
    diff_summary TEXT,
    FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE,
    FOREIGN KEY(message_id) REFERENCES messages(id) ON DELETE CASCADE
);

-- ============================================
-- TAGS
-- ============================================

CREATE TABLE IF NOT EXISTS session_tags (
    session_id TEXT NOT NULL,
    tag TEXT NOT NULL,
    auto_generated INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (session_id, tag),
    FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
);

-- ============================================
-- PROMPT HISTORY, PLANS, TODOS
-- ============================================

CREATE TABLE IF NOT EXISTS prompt_history (
    id INTEGER PRIMARY KEY,
    prompt TEXT NOT NULL,
    project_path TEXT,
    timestamp TEXT,
    timestamp_ms INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS plans (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    title TEXT,
    content TEXT,
    created_at TEXT,
    file_hash TEXT
);

CREATE TABLE IF NOT EXISTS session_todos (
    id INTEGER PRIMARY KEY,
    session_id TEXT NOT NULL,
    content TEXT,
    status TEXT,
    sequence INTEGER
);

-- ============================================
-- CHANGE DETECTION
-- ============================================

-- Internal bookkeeping: last successfully imported state per artifact
-- path. Written in the same transaction as the import it describes.
CREATE TABLE IF NOT EXISTS artifact_fingerprints (
    path TEXT PRIMARY KEY,
    digest TEXT NOT NULL,
    byte_len INTEGER NOT NULL,
    processed_at TEXT
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);
CREATE INDEX IF NOT EXISTS idx_messages_role ON messages(role);
CREATE INDEX IF NOT EXISTS idx_tool_calls_message ON tool_calls(message_id);
CREATE INDEX IF NOT EXISTS idx_tool_calls_name ON tool_calls(tool_name);
CREATE INDEX IF NOT EXISTS idx_sessions_started ON sessions(started_at);
CREATE INDEX IF NOT EXISTS idx_file_changes_session ON file_changes(session_id);
CREATE INDEX IF NOT EXISTS idx_file_changes_path ON file_changes(file_path);
CREATE INDEX IF NOT EXISTS idx_prompt_history_project ON prompt_history(project_path);
CREATE INDEX IF NOT EXISTS idx_prompt_history_ms ON prompt_history(timestamp_ms);
CREATE INDEX IF NOT EXISTS idx_session_todos_session ON session_todos(session_id);

-- ============================================
-- FULL-TEXT SEARCH
-- ============================================

CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    content,
    content='messages',
    content_rowid='id'
);

CREATE VIRTUAL TABLE IF NOT EXISTS prompt_history_fts USING fts5(
    prompt,
    content='prompt_history',
    content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS messages_ai AFTER INSERT ON messages BEGIN
    INSERT INTO messages_fts(rowid, content) VALUES (new.id, new.content);
END;

CREATE TRIGGER IF NOT EXISTS messages_ad AFTER DELETE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content)
    VALUES ('delete', old.id, old.content);
END;

CREATE TRIGGER IF NOT EXISTS messages_au AFTER UPDATE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content)
    VALUES ('delete', old.id, old.content);
    INSERT INTO messages_fts(rowid, content) VALUES (new.id, new.content);
END;

CREATE TRIGGER IF NOT EXISTS prompt_history_ai AFTER INSERT ON prompt_history BEGIN
    INSERT INTO prompt_history_fts(rowid, prompt) VALUES (new.id, new.prompt);
END;
"#;
