//! Claude Code transcript parser
//!
//! Transcripts live at `~/.claude/projects/<encoded-path>/<session-id>.jsonl`
//! and only ever grow. Each line is one JSON event. Reading resumes from a
//! byte offset, and every yielded message carries the offset just past its
//! line so the caller can persist progress once the message is stored.

use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use super::{short_hash, str_field, Content, ParsedMessage, ROLE_ASSISTANT, ROLE_USER};
use crate::timestamps;

/// Transport-level events with no conversational value
const CONTROL_TYPES: [&str; 2] = ["ping", "heartbeat"];

const UUID_FIELDS: [&str; 3] = ["uuid", "id", "message_id"];
const TIMESTAMP_FIELDS: [&str; 3] = ["timestamp", "created_at", "time"];

/// Parse one JSONL line. Blank, malformed and control lines yield `None`.
pub fn parse_line(line: &str) -> Option<ParsedMessage> {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        return None;
    }
    let data: Value = serde_json::from_str(line.trim()).ok()?;
    let map = data.as_object()?;

    let kind = str_field(map, "type").unwrap_or("unknown").to_string();
    if CONTROL_TYPES.contains(&kind.as_str()) {
        return None;
    }

    let uuid = event_uuid(map).unwrap_or_else(|| format!("gen-{}", short_hash(line.as_bytes(), 12)));

    let mut role = str_field(map, "role").map(String::from);
    if role.is_none() && (kind == ROLE_USER || kind == ROLE_ASSISTANT) {
        role = Some(kind.clone());
    }

    let nested = map.get("message").and_then(|m| m.as_object());
    let content = if let Some(raw) = map.get("content") {
        Content::from_json(raw).to_text()
    } else if let Some(message) = map.get("message") {
        match message {
            Value::Object(inner) if inner.contains_key("content") => {
                if role.is_none() {
                    role = str_field(inner, "role").map(String::from);
                }
                inner.get("content").and_then(|c| Content::from_json(c).to_text())
            }
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    } else {
        map.get("text").and_then(|t| Content::from_json(t).to_text())
    };

    let timestamp = TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| map.get(*field))
        .find(|v| is_present(v))
        .map(timestamps::normalize)
        .unwrap_or_else(timestamps::utc_now);

    let model = str_field(map, "model")
        .or_else(|| nested.and_then(|m| str_field(m, "model")))
        .map(String::from);

    let usage = map
        .get("usage")
        .filter(|u| is_present(u))
        .or_else(|| nested.and_then(|m| m.get("usage")))
        .and_then(|u| u.as_object());
    let tokens_in = usage.and_then(|u| u.get("input_tokens")).and_then(|v| v.as_i64());
    let tokens_out = usage.and_then(|u| u.get("output_tokens")).and_then(|v| v.as_i64());

    Some(ParsedMessage {
        uuid,
        kind,
        role,
        content,
        model,
        timestamp,
        tokens_in,
        tokens_out,
        cwd: str_field(map, "cwd").map(String::from),
        git_branch: str_field(map, "gitBranch").map(String::from),
        raw: Some(data.clone()),
    })
}

fn event_uuid(map: &Map<String, Value>) -> Option<String> {
    UUID_FIELDS.iter().find_map(|field| match map.get(*field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Null, empty strings, zero and `false` count as absent, the way loosely
/// written producers leave optional fields.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Object(m) => !m.is_empty(),
        _ => true,
    }
}

/// Incremental reader over one Claude transcript
///
/// Yields `(message, end_offset)` pairs up to the current end of file. A
/// final line without a newline that does not parse is treated as a write
/// in progress: it is left unconsumed so the next pass rereads it whole.
pub struct ClaudeReader {
    reader: BufReader<File>,
    position: u64,
    buf: Vec<u8>,
    done: bool,
}

impl ClaudeReader {
    pub fn open(path: &Path, offset: u64) -> io::Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(Self {
            reader: BufReader::new(file),
            position: offset,
            buf: Vec::new(),
            done: false,
        })
    }

    /// Offset just past the last fully consumed line, including skipped ones
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Iterator for ClaudeReader {
    type Item = io::Result<(ParsedMessage, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            let read = match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(n) => n,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            if read == 0 {
                self.done = true;
                break;
            }

            let complete = self.buf.last() == Some(&b'\n');
            let line = String::from_utf8_lossy(&self.buf);
            let parsed = parse_line(&line);

            if !complete && parsed.is_none() && !line.trim().is_empty() {
                self.done = true;
                break;
            }

            self.position += read as u64;
            if let Some(message) = parsed {
                return Some(Ok((message, self.position)));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::io::Write;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_parse_simple_user_message() {
        let msg =
            parse_line(r#"{"type":"user","content":"Hello","timestamp":"2024-01-15T10:30:00Z"}"#)
                .unwrap();
        assert_eq!(msg.role.as_deref(), Some("user"));
        assert_eq!(msg.content.as_deref(), Some("Hello"));
        assert_eq!(msg.timestamp, at("2024-01-15 10:30:00"));
        assert!(msg.uuid.starts_with("gen-"));
        assert_eq!(msg.uuid.len(), 16);
    }

    #[test]
    fn test_parse_nested_assistant_message() {
        let line = r#"{"type":"assistant","uuid":"u-1","cwd":"/Users/foo/code/repo","gitBranch":"main","timestamp":"2024-01-15T10:31:00.250Z","message":{"role":"assistant","model":"claude-sonnet","content":[{"type":"text","text":"Sure"},{"type":"tool_use","id":"t1","name":"Bash","input":{}}],"usage":{"input_tokens":12,"output_tokens":34}}}"#;
        let msg = parse_line(line).unwrap();
        assert_eq!(msg.uuid, "u-1");
        assert_eq!(msg.kind, "assistant");
        assert_eq!(msg.content.as_deref(), Some("Sure\n[Tool: Bash]"));
        assert_eq!(msg.model.as_deref(), Some("claude-sonnet"));
        assert_eq!(msg.tokens_in, Some(12));
        assert_eq!(msg.tokens_out, Some(34));
        assert_eq!(msg.cwd.as_deref(), Some("/Users/foo/code/repo"));
        assert_eq!(msg.git_branch.as_deref(), Some("main"));
        assert!(msg.raw.is_some());
    }

    #[test]
    fn test_role_from_nested_message() {
        let msg = parse_line(r#"{"type":"event","id":7,"message":{"role":"user","content":"hi"}}"#)
            .unwrap();
        assert_eq!(msg.role.as_deref(), Some("user"));
        assert_eq!(msg.uuid, "7");
    }

    #[test]
    fn test_absent_usage_is_null() {
        let msg = parse_line(r#"{"type":"assistant","uuid":"a","content":"x"}"#).unwrap();
        assert_eq!(msg.tokens_in, None);
        assert_eq!(msg.tokens_out, None);
        assert_eq!(msg.model, None);
    }

    #[test]
    fn test_skips_malformed_and_control_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("{not json").is_none());
        assert!(parse_line("[1,2,3]").is_none());
        assert!(parse_line(r#"{"type":"ping"}"#).is_none());
        assert!(parse_line(r#"{"type":"heartbeat","uuid":"x"}"#).is_none());
    }

    #[test]
    fn test_generated_uuid_is_deterministic() {
        let line = r#"{"type":"system","content":"boot"}"#;
        assert_eq!(parse_line(line).unwrap().uuid, parse_line(line).unwrap().uuid);
        let system = parse_line(line).unwrap();
        assert_eq!(system.role, None);
        assert!(!system.is_conversational());
    }

    #[test]
    fn test_timestamp_fallback_fields() {
        let msg = parse_line(r#"{"type":"user","uuid":"a","content":"x","created_at":1705312200}"#)
            .unwrap();
        assert_eq!(msg.timestamp, at("2024-01-15 09:50:00"));
    }

    #[test]
    fn test_zero_timestamp_falls_through() {
        let msg = parse_line(
            r#"{"type":"user","uuid":"a","content":"x","timestamp":0,"created_at":1705312200}"#,
        )
        .unwrap();
        assert_eq!(msg.timestamp, at("2024-01-15 09:50:00"));

        let before = timestamps::utc_now();
        let msg = parse_line(r#"{"type":"user","uuid":"b","content":"x","timestamp":0}"#).unwrap();
        assert!(msg.timestamp >= before);
    }

    #[test]
    fn test_reader_resumes_from_offset() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("s.jsonl");
        let mut file = File::create(&path).unwrap();
        writeln!(file, r#"{{"type":"user","uuid":"m1","content":"one"}}"#).unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, r#"{{"type":"assistant","uuid":"m2","content":"two"}}"#).unwrap();
        file.flush().unwrap();

        let first: Vec<_> = ClaudeReader::open(&path, 0)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(first.len(), 2);
        let end = first.last().unwrap().1;
        assert_eq!(end, std::fs::metadata(&path).unwrap().len());

        writeln!(file, r#"{{"type":"user","uuid":"m3","content":"three"}}"#).unwrap();
        file.flush().unwrap();

        let second: Vec<_> = ClaudeReader::open(&path, end)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].0.uuid, "m3");
    }

    #[test]
    fn test_partial_trailing_line_is_not_consumed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("s.jsonl");
        let complete = "{\"type\":\"user\",\"uuid\":\"m1\",\"content\":\"one\"}\n";
        std::fs::write(&path, format!("{}{}", complete, "{\"type\":\"assis")).unwrap();

        let mut reader = ClaudeReader::open(&path, 0).unwrap();
        let messages: Vec<_> = reader.by_ref().map(|r| r.unwrap()).collect();
        assert_eq!(messages.len(), 1);
        assert_eq!(reader.position(), complete.len() as u64);
    }

    #[test]
    fn test_position_covers_trailing_skipped_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("s.jsonl");
        std::fs::write(&path, "{\"type\":\"ping\"}\n\n").unwrap();

        let mut reader = ClaudeReader::open(&path, 0).unwrap();
        assert!(reader.next().is_none());
        assert_eq!(reader.position(), 17);
    }
}
