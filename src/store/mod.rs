//! Activity storage with SQLite
//!
//! One connection behind a mutex; every public call is one atomic unit.
//! Writes used by ingestion are idempotent so a file can be re-delivered
//! after a crash without duplicating data:
//! - projects and sessions are insert-if-absent
//! - messages are write-once, keyed by uuid
//! - session timing is a running min/max, the counter is additive

mod schema;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::identity::ProjectInfo;
use crate::parser::{ParsedMessage, Vendor};
use crate::pending::{active_cutoff, PendingInteraction, ACTIVE_WINDOW_DAYS};
use crate::timestamps::{self, to_storage};

pub use schema::SCHEMA;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Result of a write-once insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// New row with its id
    Inserted(i64),
    /// The uuid was already stored; nothing changed
    Duplicate,
}

impl InsertOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, InsertOutcome::Inserted(_))
    }
}

/// What [`ActivityStore::insert_batch`] stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Messages that were new
    pub inserted: usize,
    /// New user/assistant messages folded into the session counter
    pub counted: usize,
}

pub struct ActivityStore {
    conn: Mutex<Connection>,
}

impl ActivityStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir for {}", path.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open db {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("activity store mutex poisoned")
    }

    // ============================================
    // PROJECTS
    // ============================================

    /// Id of the project at `path`, creating it with `info` on first sight.
    /// An existing project keeps its original name and org.
    pub fn get_or_create_project(&self, path: &str, info: &ProjectInfo) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO projects (path, name, org, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(path) DO NOTHING",
            params![path, info.name, info.org, to_storage(&timestamps::utc_now())],
        )?;
        let id = conn.query_row(
            "SELECT id FROM projects WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_project(&self, id: i64) -> Result<Option<ProjectRow>> {
        self.conn()
            .query_row(
                &format!("{} WHERE id = ?1", PROJECT_SELECT),
                params![id],
                project_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_project_by_path(&self, path: &str) -> Result<Option<ProjectRow>> {
        self.conn()
            .query_row(
                &format!("{} WHERE path = ?1", PROJECT_SELECT),
                params![path],
                project_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn list_projects(&self) -> Result<Vec<ProjectRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{} ORDER BY name, path", PROJECT_SELECT))?;
        let rows = stmt.query_map([], project_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Projects at or below a directory
    pub fn projects_under(&self, prefix: &str) -> Result<Vec<ProjectRow>> {
        let base = prefix.trim_end_matches('/');
        let nested = format!("{}/", base);
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE path = ?1 OR substr(path, 1, length(?2)) = ?2 ORDER BY path",
            PROJECT_SELECT
        ))?;
        let rows = stmt.query_map(params![base, nested], project_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ============================================
    // SESSIONS
    // ============================================

    /// Id of the session, creating it on first sight. The first non-null git
    /// branch sticks; the owning project never changes.
    pub fn get_or_create_session(
        &self,
        session_id: &str,
        project_id: i64,
        source: Vendor,
        git_branch: Option<&str>,
    ) -> Result<i64> {
        let id = self.conn().query_row(
            "INSERT INTO sessions (session_id, project_id, source, git_branch)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
                 git_branch = COALESCE(sessions.git_branch, excluded.git_branch)
             RETURNING id",
            params![session_id, project_id, source.as_str(), git_branch],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Fold a batch into session timing: running min on `started_at`,
    /// running max on `ended_at`, additive `message_count`.
    ///
    /// Not idempotent for the counter; callers pass only newly inserted messages.
    pub fn update_session(
        &self,
        id: i64,
        started_at: Option<NaiveDateTime>,
        ended_at: Option<NaiveDateTime>,
        delta_count: i64,
    ) -> Result<()> {
        fold_session_timing(&self.conn(), id, started_at, ended_at, delta_count)
    }

    /// Set or clear the pending interaction. Payload and time always move together.
    pub fn set_pending_interaction(
        &self,
        id: i64,
        pending: Option<&PendingInteraction>,
    ) -> Result<()> {
        let (payload, time) = match pending {
            Some(p) => {
                let at = p.timestamp.unwrap_or_else(timestamps::utc_now);
                (Some(serde_json::to_string(p)?), Some(to_storage(&at)))
            }
            None => (None, None),
        };
        self.conn().execute(
            "UPDATE sessions SET pending_question = ?2, pending_question_time = ?3 WHERE id = ?1",
            params![id, payload, time],
        )?;
        Ok(())
    }

    /// Session by vendor id
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>> {
        let cutoff = active_cutoff(timestamps::utc_now(), ACTIVE_WINDOW_DAYS);
        self.conn()
            .query_row(
                &format!("{} WHERE s.session_id = ?2", SESSION_SELECT),
                params![to_storage(&cutoff), session_id],
                session_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Recent sessions; those with an active pending interaction come first,
    /// newest question first, then the rest by start time.
    pub fn list_sessions(&self, filter: &SessionFilter) -> Result<Vec<SessionRow>> {
        let cutoff = active_cutoff(timestamps::utc_now(), filter.pending_max_age_days);
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?2 IS NULL OR s.project_id = ?2)
                AND (?3 IS NULL OR s.started_at >= ?3)
             ORDER BY active_pending DESC,
                      CASE WHEN active_pending = 1 THEN s.pending_question_time
                           ELSE s.started_at END DESC
             LIMIT ?4",
            SESSION_SELECT
        ))?;
        let rows = stmt.query_map(
            params![
                to_storage(&cutoff),
                filter.project_id,
                filter.since.as_ref().map(to_storage),
                filter.limit as i64
            ],
            session_from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Sessions whose pending interaction is within the activity window
    pub fn pending_sessions(&self, now: NaiveDateTime, max_age_days: i64) -> Result<Vec<SessionRow>> {
        let cutoff = active_cutoff(now, max_age_days);
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE s.pending_question_time >= ?1 ORDER BY s.pending_question_time DESC",
            SESSION_SELECT
        ))?;
        let rows = stmt.query_map(params![to_storage(&cutoff)], session_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ============================================
    // MESSAGES
    // ============================================

    /// Store a message unless its uuid is already known.
    pub fn insert_message(&self, session: i64, msg: &ParsedMessage) -> Result<InsertOutcome> {
        insert_message_row(&self.conn(), session, msg)
    }

    /// Store a parsed batch and fold its new conversational messages into
    /// session timing, all in one transaction. A failure leaves neither
    /// messages nor counters behind, so the batch can simply be retried.
    pub fn insert_batch(&self, session: i64, batch: &[ParsedMessage]) -> Result<BatchOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut outcome = BatchOutcome::default();
        let mut first: Option<NaiveDateTime> = None;
        let mut last: Option<NaiveDateTime> = None;

        for msg in batch {
            if !insert_message_row(&tx, session, msg)?.is_inserted() {
                continue;
            }
            outcome.inserted += 1;
            if msg.is_conversational() {
                outcome.counted += 1;
                first = Some(first.map_or(msg.timestamp, |t| t.min(msg.timestamp)));
                last = Some(last.map_or(msg.timestamp, |t| t.max(msg.timestamp)));
            }
        }

        if outcome.counted > 0 {
            fold_session_timing(&tx, session, first, last, outcome.counted as i64)?;
        }
        tx.commit()?;
        Ok(outcome)
    }

    pub fn messages_for_session(&self, session: i64) -> Result<Vec<MessageRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE m.session_id = ?1 ORDER BY m.timestamp, m.id",
            MESSAGE_SELECT
        ))?;
        let rows = stmt.query_map(params![session], message_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Messages in the half-open UTC interval `[start, end)`
    pub fn messages_in_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        project_id: Option<i64>,
    ) -> Result<Vec<MessageRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE m.timestamp >= ?1 AND m.timestamp < ?2
                AND (?3 IS NULL OR s.project_id = ?3)
             ORDER BY m.timestamp, m.id",
            MESSAGE_SELECT
        ))?;
        let rows = stmt.query_map(
            params![to_storage(&start), to_storage(&end), project_id],
            message_from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Raw events of a session in insertion order, for pending detection
    pub fn raw_events(&self, session: i64) -> Result<Vec<Value>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT raw_json FROM messages
             WHERE session_id = ?1 AND raw_json IS NOT NULL
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session], |row| row.get::<_, String>(0))?;
        let mut events = Vec::new();
        for raw in rows {
            if let Ok(value) = serde_json::from_str(&raw?) {
                events.push(value);
            }
        }
        Ok(events)
    }

    // ============================================
    // FILE CURSORS
    // ============================================

    /// Consumed byte offset of a transcript, 0 if never read
    pub fn get_cursor(&self, path: &Path) -> Result<u64> {
        let offset: Option<i64> = self
            .conn()
            .query_row(
                "SELECT last_position FROM processed_files WHERE file_path = ?1",
                params![path.to_string_lossy().to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(offset.unwrap_or(0).max(0) as u64)
    }

    pub fn set_cursor(
        &self,
        path: &Path,
        offset: u64,
        modified: Option<NaiveDateTime>,
    ) -> Result<()> {
        let modified = modified.unwrap_or_else(timestamps::utc_now);
        self.conn().execute(
            "INSERT INTO processed_files (file_path, last_position, last_modified)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(file_path) DO UPDATE SET
                 last_position = excluded.last_position,
                 last_modified = excluded.last_modified",
            params![path.to_string_lossy().to_string(), offset as i64, to_storage(&modified)],
        )?;
        Ok(())
    }

    // ============================================
    // SUMMARIES
    // ============================================

    /// Store a summary, replacing any existing one for the same period and project.
    pub fn save_summary(
        &self,
        period_type: &str,
        start: NaiveDate,
        end: NaiveDate,
        summary: &str,
        project_id: Option<i64>,
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let start = start.format(DATE_FORMAT).to_string();
        tx.execute(
            "DELETE FROM summaries
             WHERE project_id IS ?1 AND period_type = ?2 AND period_start = ?3",
            params![project_id, period_type, start],
        )?;
        tx.execute(
            "INSERT INTO summaries (project_id, period_type, period_start, period_end, summary, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                project_id,
                period_type,
                start,
                end.format(DATE_FORMAT).to_string(),
                summary,
                to_storage(&timestamps::utc_now()),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_summary(
        &self,
        period_type: &str,
        start: NaiveDate,
        project_id: Option<i64>,
    ) -> Result<Option<SummaryRow>> {
        self.conn()
            .query_row(
                &format!(
                    "{} WHERE period_type = ?1 AND period_start = ?2 AND project_id IS ?3",
                    SUMMARY_SELECT
                ),
                params![period_type, start.format(DATE_FORMAT).to_string(), project_id],
                summary_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Summaries whose period starts within `[start, end]`
    pub fn summaries_in_range(
        &self,
        period_type: &str,
        start: NaiveDate,
        end: NaiveDate,
        project_id: Option<i64>,
    ) -> Result<Vec<SummaryRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE period_type = ?1 AND period_start >= ?2 AND period_start <= ?3
                AND project_id IS ?4
             ORDER BY period_start",
            SUMMARY_SELECT
        ))?;
        let rows = stmt.query_map(
            params![
                period_type,
                start.format(DATE_FORMAT).to_string(),
                end.format(DATE_FORMAT).to_string(),
                project_id
            ],
            summary_from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// UTC dates before today that have messages but no daily summary.
    pub fn list_unsummarized_days(&self, project_id: Option<i64>) -> Result<Vec<NaiveDate>> {
        let today = timestamps::utc_now().date().format(DATE_FORMAT).to_string();
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT substr(m.timestamp, 1, 10) AS day
             FROM messages m
             JOIN sessions s ON m.session_id = s.id
             WHERE (?1 IS NULL OR s.project_id = ?1)
               AND substr(m.timestamp, 1, 10) < ?2
               AND NOT EXISTS (
                   SELECT 1 FROM summaries x
                   WHERE x.period_type = 'daily'
                     AND x.period_start = substr(m.timestamp, 1, 10)
                     AND x.project_id IS ?1
               )
             ORDER BY day",
        )?;
        let rows = stmt.query_map(params![project_id, today], |row| row.get::<_, String>(0))?;
        let mut days = Vec::new();
        for day in rows {
            let day = day?;
            let parsed = NaiveDate::parse_from_str(&day, DATE_FORMAT)
                .with_context(|| format!("bad stored date {:?}", day))?;
            days.push(parsed);
        }
        Ok(days)
    }

    // ============================================
    // STATS
    // ============================================

    /// Totals, optionally limited to sessions started since an instant
    pub fn stats(&self, since: Option<NaiveDateTime>) -> Result<Stats> {
        let since = since.as_ref().map(to_storage);
        let conn = self.conn();
        let total_sessions = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE ?1 IS NULL OR started_at >= ?1",
            params![since],
            |row| row.get(0),
        )?;
        let total_messages = conn.query_row(
            "SELECT COUNT(*) FROM messages m JOIN sessions s ON m.session_id = s.id
             WHERE ?1 IS NULL OR s.started_at >= ?1",
            params![since],
            |row| row.get(0),
        )?;
        let total_projects = conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
        Ok(Stats {
            total_sessions,
            total_messages,
            total_projects,
        })
    }
}

fn insert_message_row(conn: &Connection, session: i64, msg: &ParsedMessage) -> Result<InsertOutcome> {
    let raw = msg.raw.as_ref().map(Value::to_string);
    let changed = conn.execute(
        "INSERT INTO messages
             (session_id, uuid, type, role, content, model, timestamp, tokens_in, tokens_out, raw_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(uuid) DO NOTHING",
        params![
            session,
            msg.uuid,
            msg.kind,
            msg.role,
            msg.content,
            msg.model,
            to_storage(&msg.timestamp),
            msg.tokens_in,
            msg.tokens_out,
            raw,
        ],
    )?;
    if changed == 0 {
        Ok(InsertOutcome::Duplicate)
    } else {
        Ok(InsertOutcome::Inserted(conn.last_insert_rowid()))
    }
}

fn fold_session_timing(
    conn: &Connection,
    id: i64,
    started_at: Option<NaiveDateTime>,
    ended_at: Option<NaiveDateTime>,
    delta_count: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET
             started_at = CASE WHEN ?2 IS NOT NULL AND (started_at IS NULL OR started_at > ?2)
                               THEN ?2 ELSE started_at END,
             ended_at = CASE WHEN ?3 IS NOT NULL AND (ended_at IS NULL OR ended_at < ?3)
                             THEN ?3 ELSE ended_at END,
             message_count = message_count + ?4
         WHERE id = ?1",
        params![
            id,
            started_at.as_ref().map(to_storage),
            ended_at.as_ref().map(to_storage),
            delta_count
        ],
    )?;
    Ok(())
}

// ============================================
// ROW TYPES
// ============================================

#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: i64,
    pub path: String,
    pub name: Option<String>,
    pub org: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: i64,
    pub session_id: String,
    pub project_id: i64,
    pub source: String,
    pub git_branch: Option<String>,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
    pub message_count: i64,
    pub pending: Option<PendingInteraction>,
    /// Pending interaction exists and is inside the activity window
    pub active_pending: bool,
    pub project_name: Option<String>,
    pub project_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub session_id: i64,
    pub uuid: String,
    pub kind: String,
    pub role: Option<String>,
    pub content: Option<String>,
    pub model: Option<String>,
    pub timestamp: NaiveDateTime,
    pub tokens_in: Option<i64>,
    pub tokens_out: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub id: i64,
    pub project_id: Option<i64>,
    pub period_type: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub summary: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub total_sessions: i64,
    pub total_messages: i64,
    pub total_projects: i64,
}

/// Filter for [`ActivityStore::list_sessions`]
#[derive(Debug, Clone)]
pub struct SessionFilter {
    pub project_id: Option<i64>,
    pub since: Option<NaiveDateTime>,
    pub limit: usize,
    pub pending_max_age_days: i64,
}

impl Default for SessionFilter {
    fn default() -> Self {
        Self {
            project_id: None,
            since: None,
            limit: 50,
            pending_max_age_days: ACTIVE_WINDOW_DAYS,
        }
    }
}

const PROJECT_SELECT: &str = "SELECT id, path, name, org, created_at FROM projects";

/// `?1` is the activity-window cutoff for `active_pending`.
const SESSION_SELECT: &str = "SELECT s.id, s.session_id, s.project_id, s.source, s.git_branch,
        s.started_at, s.ended_at, s.message_count, s.pending_question, s.pending_question_time,
        CASE WHEN s.pending_question IS NOT NULL AND s.pending_question_time >= ?1
             THEN 1 ELSE 0 END AS active_pending,
        p.name, p.path
     FROM sessions s
     LEFT JOIN projects p ON s.project_id = p.id";

const MESSAGE_SELECT: &str = "SELECT m.id, m.session_id, m.uuid, m.type, m.role, m.content,
        m.model, m.timestamp, m.tokens_in, m.tokens_out
     FROM messages m
     JOIN sessions s ON m.session_id = s.id";

const SUMMARY_SELECT: &str = "SELECT id, project_id, period_type, period_start, period_end,
        summary, created_at
     FROM summaries";

fn conversion_error(idx: usize, text: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        format!("unparseable stored value {:?}", text).into(),
    )
}

fn instant(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let text: String = row.get(idx)?;
    timestamps::from_storage(&text).ok_or_else(|| conversion_error(idx, &text))
}

fn optional_instant(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| timestamps::from_storage(&t).ok_or_else(|| conversion_error(idx, &t)))
        .transpose()
}

fn date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|_| conversion_error(idx, &text))
}

fn project_from_row(row: &Row) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        path: row.get(1)?,
        name: row.get(2)?,
        org: row.get(3)?,
        created_at: instant(row, 4)?,
    })
}

fn session_from_row(row: &Row) -> rusqlite::Result<SessionRow> {
    let payload: Option<String> = row.get(8)?;
    let pending_time = optional_instant(row, 9)?;
    // a payload written by an older layout is ignored rather than failing the row
    let pending = payload
        .and_then(|p| serde_json::from_str::<PendingInteraction>(&p).ok())
        .map(|mut p| {
            p.timestamp = pending_time;
            p
        });
    Ok(SessionRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        project_id: row.get(2)?,
        source: row.get(3)?,
        git_branch: row.get(4)?,
        started_at: optional_instant(row, 5)?,
        ended_at: optional_instant(row, 6)?,
        message_count: row.get(7)?,
        pending,
        active_pending: row.get::<_, i64>(10)? == 1,
        project_name: row.get(11)?,
        project_path: row.get(12)?,
    })
}

fn message_from_row(row: &Row) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        uuid: row.get(2)?,
        kind: row.get(3)?,
        role: row.get(4)?,
        content: row.get(5)?,
        model: row.get(6)?,
        timestamp: instant(row, 7)?,
        tokens_in: row.get(8)?,
        tokens_out: row.get(9)?,
    })
}

fn summary_from_row(row: &Row) -> rusqlite::Result<SummaryRow> {
    Ok(SummaryRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        period_type: row.get(2)?,
        period_start: date(row, 3)?,
        period_end: date(row, 4)?,
        summary: row.get(5)?,
        created_at: instant(row, 6)?,
    })
}
