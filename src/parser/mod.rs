//! Transcript parsers and the normalized message shape they produce
//!
//! Two vendors are supported:
//! - Claude Code: append-only JSONL at `<root>/projects/<encoded-path>/<session>.jsonl`
//! - Cursor: rewritten wholesale at
//!   `<root>/projects/<encoded-path>/agent-transcripts/<session>.(txt|json)`
//!
//! Content shapes vary per event (string, list of typed blocks, nested
//! object). They are resolved once into [`Content`] and rendered to plain
//! text; the raw event is kept next to the message for pending detection.

pub mod claude;
pub mod cursor;

pub use claude::{parse_line, ClaudeReader};
pub use cursor::{content_hash, CursorChangeTracker};

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

/// Transcript vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    /// Append-only JSONL, resumable by byte offset
    ClaudeCode,
    /// Whole-file rewrites, change-detected by content hash
    Cursor,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::ClaudeCode => "claude_code",
            Vendor::Cursor => "cursor",
        }
    }

    /// Store-level session id for a transcript file stem.
    ///
    /// Cursor ids are prefixed so they can never collide with Claude UUIDs.
    pub fn session_id(&self, file_stem: &str) -> String {
        match self {
            Vendor::ClaudeCode => file_stem.to_string(),
            Vendor::Cursor => format!("cursor-{}", file_stem),
        }
    }

    /// Whether a path looks like one of this vendor's transcript files
    pub fn is_transcript(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match self {
            Vendor::ClaudeCode => ext == "jsonl",
            Vendor::Cursor => {
                let in_transcripts = path
                    .parent()
                    .and_then(|p| p.file_name())
                    .map(|n| n == "agent-transcripts")
                    .unwrap_or(false);
                in_transcripts && matches!(ext, "txt" | "json")
            }
        }
    }
}

/// One normalized transcript message
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    /// Vendor UUID, or an id derived deterministically from the content
    pub uuid: String,
    /// Vendor event type (`user`, `assistant`, `system`, ...)
    pub kind: String,
    pub role: Option<String>,
    pub content: Option<String>,
    pub model: Option<String>,
    pub timestamp: NaiveDateTime,
    pub tokens_in: Option<i64>,
    pub tokens_out: Option<i64>,
    /// Working directory recorded by the vendor, authoritative for project identity
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    /// Original event, kept for pending-interaction detection
    pub raw: Option<Value>,
}

impl ParsedMessage {
    /// User/assistant messages move session timing; system and meta events do not.
    pub fn is_conversational(&self) -> bool {
        matches!(self.role.as_deref(), Some(ROLE_USER) | Some(ROLE_ASSISTANT))
    }
}

/// A typed content block
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text(String),
    ToolUse {
        id: Option<String>,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: Option<String>,
    },
    /// Bare string inside a block list
    Plain(String),
    /// Thinking, images and anything else that has no text rendering
    Other,
}

impl Block {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Block::Plain(s.clone()),
            Value::Object(map) => match str_field(map, "type") {
                Some("text") => Block::Text(str_field(map, "text").unwrap_or_default().to_string()),
                Some("tool_use") => Block::ToolUse {
                    id: str_field(map, "id").map(String::from),
                    name: str_field(map, "name").unwrap_or("unknown").to_string(),
                    input: map.get("input").cloned().unwrap_or(Value::Null),
                },
                Some("tool_result") => Block::ToolResult {
                    tool_use_id: str_field(map, "tool_use_id").map(String::from),
                },
                _ => Block::Other,
            },
            _ => Block::Other,
        }
    }

    /// One-line rendering used in normalized text
    fn render(&self) -> Option<String> {
        match self {
            Block::Text(text) | Block::Plain(text) => Some(text.clone()),
            Block::ToolUse { name, .. } => Some(format!("[Tool: {}]", name)),
            Block::ToolResult { .. } => Some("[Tool Result]".to_string()),
            Block::Other => None,
        }
    }
}

/// Message content resolved from its JSON shape
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Empty,
    Text(String),
    Blocks(Vec<Block>),
    /// `{"message": ...}` wrapper, resolved with the same rules
    Nested(Box<Content>),
    /// Object or scalar with no known text field, rendered as JSON
    Opaque(Value),
}

impl Content {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Content::Empty,
            Value::String(s) => Content::Text(s.clone()),
            Value::Array(items) => Content::Blocks(items.iter().map(Block::from_json).collect()),
            Value::Object(map) => {
                if let Some(text) = map.get("text") {
                    match text {
                        Value::String(s) => Content::Text(s.clone()),
                        other => Content::Opaque(other.clone()),
                    }
                } else if let Some(inner) = map.get("message") {
                    Content::Nested(Box::new(Content::from_json(inner)))
                } else {
                    Content::Opaque(value.clone())
                }
            }
            other => Content::Opaque(other.clone()),
        }
    }

    /// Normalized plain text, `None` when nothing renders
    pub fn to_text(&self) -> Option<String> {
        match self {
            Content::Empty => None,
            Content::Text(text) => Some(text.clone()),
            Content::Blocks(blocks) => {
                let parts: Vec<String> = blocks.iter().filter_map(Block::render).collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
            Content::Nested(inner) => inner.to_text(),
            Content::Opaque(Value::String(s)) => Some(s.clone()),
            Content::Opaque(other) => Some(other.to_string()),
        }
    }

    /// Typed blocks, empty unless the content was a block list
    pub fn blocks(&self) -> &[Block] {
        match self {
            Content::Blocks(blocks) => blocks,
            _ => &[],
        }
    }
}

pub(crate) fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(|v| v.as_str())
}

/// First `len` hex characters of the SHA-256 of `input`
pub(crate) fn short_hash(input: &[u8], len: usize) -> String {
    let digest = hex::encode(Sha256::digest(input));
    digest[..len.min(digest.len())].to_string()
}
