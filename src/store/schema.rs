//! SQLite schema
//!
//! Instants are UTC text `YYYY-MM-DD HH:MM:SS.ffffff` so that string
//! comparison orders them. Summary periods are plain `YYYY-MM-DD` dates.

pub const SCHEMA: &str = r#"
-- ============================================
-- PROJECTS
-- ============================================

-- One row per project directory; name/org fixed at creation
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY,
    path TEXT NOT NULL UNIQUE,
    name TEXT,
    org TEXT,
    created_at TEXT NOT NULL
);

-- ============================================
-- SESSIONS
-- ============================================

CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY,
    session_id TEXT NOT NULL UNIQUE,       -- vendor id, 'cursor-' prefixed for Cursor
    project_id INTEGER NOT NULL,
    source TEXT NOT NULL DEFAULT 'claude_code',  -- 'claude_code' | 'cursor'
    git_branch TEXT,                       -- first non-null value wins
    started_at TEXT,                       -- running min
    ended_at TEXT,                         -- running max
    message_count INTEGER NOT NULL DEFAULT 0,
    pending_question TEXT,                 -- JSON PendingInteraction
    pending_question_time TEXT,
    CHECK ((pending_question IS NULL) = (pending_question_time IS NULL)),
    FOREIGN KEY(project_id) REFERENCES projects(id)
);

-- ============================================
-- MESSAGES
-- ============================================

-- Write-once; duplicate uuids are ignored
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY,
    session_id INTEGER NOT NULL,
    uuid TEXT NOT NULL UNIQUE,
    type TEXT NOT NULL,
    role TEXT,
    content TEXT,
    model TEXT,
    timestamp TEXT NOT NULL,
    tokens_in INTEGER,
    tokens_out INTEGER,
    raw_json TEXT,                         -- original event for pending detection
    FOREIGN KEY(session_id) REFERENCES sessions(id)
);

-- ============================================
-- SUMMARIES
-- ============================================

-- Written by the summarizer; ingestion never touches this table
CREATE TABLE IF NOT EXISTS summaries (
    id INTEGER PRIMARY KEY,
    project_id INTEGER,                    -- NULL = across all projects
    period_type TEXT NOT NULL,             -- 'daily', 'weekly', 'monthly'
    period_start TEXT NOT NULL,
    period_end TEXT NOT NULL,
    summary TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(project_id, period_type, period_start),
    FOREIGN KEY(project_id) REFERENCES projects(id)
);

-- ============================================
-- FILE CURSORS
-- ============================================

-- Byte offset consumed so far per append-only transcript
CREATE TABLE IF NOT EXISTS processed_files (
    file_path TEXT PRIMARY KEY,
    last_position INTEGER NOT NULL DEFAULT 0,
    last_modified TEXT
);

-- ============================================
-- INDEXES
-- ============================================

CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project_id);
CREATE INDEX IF NOT EXISTS idx_sessions_started ON sessions(started_at);
CREATE INDEX IF NOT EXISTS idx_sessions_pending ON sessions(pending_question_time);
CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id);
CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp);
CREATE INDEX IF NOT EXISTS idx_summaries_period ON summaries(period_type, period_start);
"#;
