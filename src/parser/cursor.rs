//! Cursor agent transcript parser
//!
//! Transcripts live at
//! `~/.cursor/projects/<encoded-path>/agent-transcripts/<session-id>.(txt|json)`
//! and are rewritten wholesale on every update, so each pass parses the
//! whole file. The format has no per-turn timestamps or ids; the file mtime
//! stands in for the former and a hash of position plus content for the latter.

use chrono::NaiveDateTime;
use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use super::{short_hash, ParsedMessage, ROLE_ASSISTANT, ROLE_USER};

const USER_MARKER: &str = "user:";
const ASSISTANT_MARKERS: [&str; 2] = ["assistant:", "A:"];

/// Characters of content that feed the derived message id
const ID_CONTENT_CHARS: usize = 200;

fn turn_marker(line: &str) -> Option<(&'static str, &str)> {
    if let Some(rest) = line.strip_prefix(USER_MARKER) {
        return Some((ROLE_USER, rest));
    }
    ASSISTANT_MARKERS
        .iter()
        .find_map(|marker| line.strip_prefix(marker))
        .map(|rest| (ROLE_ASSISTANT, rest))
}

/// Deterministic id from turn position and leading content
fn message_uuid(index: usize, content: &str) -> String {
    let head: String = content.chars().take(ID_CONTENT_CHARS).collect();
    format!("cursor-{}", short_hash(format!("{}:{}", index, head).as_bytes(), 16))
}

/// Drop `[Thinking]` markers and turn `<think>...</think>` into a leading
/// `[Thinking] ` marker followed by the enclosed text and a line break.
fn clean_assistant(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("[Thinking]") {
        out.push_str(&rest[..idx]);
        rest = rest[idx + "[Thinking]".len()..].trim_start();
    }
    out.push_str(rest);

    let mut cleaned = String::with_capacity(out.len());
    let mut rest = out.as_str();
    loop {
        let open = rest.find("<think>");
        let close = rest.find("</think>");
        match (open, close) {
            (Some(o), c) if c.map_or(true, |c| o < c) => {
                cleaned.push_str(&rest[..o]);
                cleaned.push_str("[Thinking] ");
                rest = rest[o + "<think>".len()..].trim_start();
            }
            (_, Some(c)) => {
                cleaned.push_str(rest[..c].trim_end());
                cleaned.push('\n');
                rest = &rest[c + "</think>".len()..];
            }
            _ => break,
        }
    }
    cleaned.push_str(rest);
    cleaned
}

fn message(
    uuid: String,
    role: &str,
    content: String,
    mtime: NaiveDateTime,
    raw: Option<Value>,
) -> ParsedMessage {
    ParsedMessage {
        uuid,
        kind: role.to_string(),
        role: Some(role.to_string()),
        content: Some(content),
        model: None,
        timestamp: mtime,
        tokens_in: None,
        tokens_out: None,
        cwd: None,
        git_branch: None,
        raw,
    }
}

/// Parse the plain-text format: `user:` / `assistant:` (legacy `A:`) at the
/// start of a line open a new turn. Text before the first marker is ignored.
pub fn parse_txt(content: &str, mtime: NaiveDateTime) -> Vec<ParsedMessage> {
    let mut turns: Vec<(&'static str, String)> = Vec::new();
    for line in content.lines() {
        if let Some((role, rest)) = turn_marker(line) {
            turns.push((role, rest.to_string()));
        } else if let Some((_, body)) = turns.last_mut() {
            body.push('\n');
            body.push_str(line);
        }
    }

    let mut messages = Vec::new();
    for (role, body) in turns {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            continue;
        }
        let text = if role == ROLE_ASSISTANT {
            clean_assistant(trimmed)
        } else {
            trimmed.to_string()
        };
        let uuid = message_uuid(messages.len(), &text);
        messages.push(message(uuid, role, text, mtime, None));
    }
    messages
}

/// Parse the JSON format: an array of `{role, text}` records. Anything but
/// user/assistant records with non-blank text is skipped.
pub fn parse_json(content: &str, mtime: NaiveDateTime) -> Vec<ParsedMessage> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(content) else {
        return Vec::new();
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let record = item.as_object()?;
            let role = record.get("role")?.as_str()?.to_lowercase();
            let role = match role.as_str() {
                ROLE_USER => ROLE_USER,
                ROLE_ASSISTANT => ROLE_ASSISTANT,
                _ => return None,
            };
            let text = record.get("text")?.as_str()?.to_string();
            if text.trim().is_empty() {
                return None;
            }
            let uuid = message_uuid(index, &text);
            Some(message(uuid, role, text, mtime, Some(item.clone())))
        })
        .collect()
}

/// Parse file content by extension: `.json` is the record array, anything
/// else the text format.
pub fn parse_file(path: &Path, content: &str, mtime: NaiveDateTime) -> Vec<ParsedMessage> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_json(content, mtime),
        _ => parse_txt(content, mtime),
    }
}

/// Full SHA-256 of file content, hex encoded
pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Last successfully ingested content hash per Cursor transcript.
///
/// Lives in memory only; a restart reparses every file once and relies on
/// message deduplication.
#[derive(Debug, Default)]
pub struct CursorChangeTracker {
    hashes: DashMap<PathBuf, String>,
}

impl CursorChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_unchanged(&self, path: &Path, hash: &str) -> bool {
        self.hashes
            .get(path)
            .map(|seen| seen.value() == hash)
            .unwrap_or(false)
    }

    /// Remember a hash. Call only after the content is durably stored.
    pub fn record(&self, path: &Path, hash: String) {
        self.hashes.insert(path.to_path_buf(), hash);
    }
}
