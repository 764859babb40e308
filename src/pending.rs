//! Pending-interaction detection
//!
//! A session is waiting on a human when its most recent assistant tool
//! invocation has no matching user tool result anywhere in the history.
//! The whole history is rescanned every time; a result can arrive
//! arbitrarily long after its invocation.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::parser::{Block, Content, ROLE_ASSISTANT, ROLE_USER};
use crate::timestamps;

/// Tool the assistant uses to ask the user an explicit question
pub const QUESTION_TOOL: &str = "AskUserQuestion";

/// Pending interactions older than this no longer count as active.
pub const ACTIVE_WINDOW_DAYS: i64 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInteraction {
    pub tool_use_id: Option<String>,
    pub tool_name: String,
    /// First question text, only for [`QUESTION_TOOL`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// When the invocation was made, if the event recorded it
    #[serde(skip)]
    pub timestamp: Option<NaiveDateTime>,
}

/// Author and content of one raw event.
///
/// The role comes from the event, then its nested message, then its type.
/// Content is `message.content` when the event wraps a message object.
fn role_and_content(event: &Value) -> Option<(&str, Content)> {
    let map = event.as_object()?;
    let nested = map.get("message").and_then(|m| m.as_object());
    let role = map
        .get("role")
        .and_then(|r| r.as_str())
        .or_else(|| nested.and_then(|m| m.get("role")).and_then(|r| r.as_str()))
        .or_else(|| map.get("type").and_then(|t| t.as_str()))?;
    let raw = match nested {
        Some(message) => message.get("content"),
        None => map.get("content"),
    };
    Some((role, raw.map(Content::from_json).unwrap_or(Content::Empty)))
}

fn event_timestamp(event: &Value) -> Option<NaiveDateTime> {
    ["timestamp", "created_at"]
        .iter()
        .filter_map(|field| event.get(*field))
        .find(|v| !v.is_null())
        .map(timestamps::normalize)
}

fn invocation(block: &Block, at: Option<NaiveDateTime>) -> Option<PendingInteraction> {
    let Block::ToolUse { id, name, input } = block else {
        return None;
    };
    let mut pending = PendingInteraction {
        tool_use_id: id.clone(),
        tool_name: name.clone(),
        question: None,
        header: None,
        timestamp: at,
    };
    if name == QUESTION_TOOL {
        if let Some(first) = input
            .get("questions")
            .and_then(|q| q.as_array())
            .and_then(|q| q.first())
        {
            let field = |key: &str| {
                Some(first.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string())
            };
            pending.question = field("question");
            pending.header = field("header");
        }
    }
    Some(pending)
}

/// Most recent unanswered tool invocation in an ordered event history.
pub fn detect(events: &[Value]) -> Option<PendingInteraction> {
    let mut invocations = Vec::new();
    let mut answered: HashSet<Option<String>> = HashSet::new();

    for event in events {
        let Some((role, content)) = role_and_content(event) else {
            continue;
        };
        match role {
            ROLE_ASSISTANT => {
                let at = event_timestamp(event);
                invocations.extend(content.blocks().iter().filter_map(|b| invocation(b, at)));
            }
            ROLE_USER => {
                for block in content.blocks() {
                    if let Block::ToolResult { tool_use_id } = block {
                        answered.insert(tool_use_id.clone());
                    }
                }
            }
            _ => {}
        }
    }

    invocations
        .into_iter()
        .rev()
        .find(|p| !answered.contains(&p.tool_use_id))
}

/// Oldest question time that still counts as active at `now`.
pub fn active_cutoff(now: NaiveDateTime, max_age_days: i64) -> NaiveDateTime {
    now - Duration::days(max_age_days)
}
