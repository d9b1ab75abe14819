//! Result shaping: bounds tool payloads before they re-enter the conversation.
//!
//! Each tool family keeps only the fields and item counts the model needs.
//! Everything here is pure; truncation counts chars, never bytes.

use serde_json::{Map, Value, json};

const FAQ_MATCHES: usize = 3;
const FAQ_TEXT_CHARS: usize = 200;
const FAQ_CONTEXT_CHARS: usize = 500;
const WIKI_PAGES: usize = 5;
const WIKI_SNIPPET_CHARS: usize = 500;
const ISSUE_LIST_ITEMS: usize = 10;
const ISSUE_DESCRIPTION_CHARS: usize = 500;
const DRIVE_FILES: usize = 5;
const THREAD_MESSAGES: usize = 20;
const THREAD_TEXT_CHARS: usize = 1000;
const BARE_ARRAY_ITEMS: usize = 10;

/// The kind of tool that produced a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolFamily {
    /// `faq_search`
    FaqSearch,
    /// `growi_searchPages`
    WikiSearch,
    /// `redmine_getIssues`
    IssueList,
    /// `redmine_getIssue`
    IssueDetail,
    /// Any other `redmine_*`
    IssueTracker,
    /// `google_searchDriveFiles`
    FileSearch,
    /// `slack_getThreadMessages`
    ChatThread,
    /// Any other `slack_*`
    Chat,
    Other,
}

impl ToolFamily {
    pub fn of(tool_name: &str) -> Self {
        match tool_name {
            "faq_search" => Self::FaqSearch,
            "growi_searchPages" => Self::WikiSearch,
            "redmine_getIssues" => Self::IssueList,
            "redmine_getIssue" => Self::IssueDetail,
            "google_searchDriveFiles" => Self::FileSearch,
            "slack_getThreadMessages" => Self::ChatThread,
            name if name.starts_with("redmine_") => Self::IssueTracker,
            name if name.starts_with("slack_") => Self::Chat,
            _ => Self::Other,
        }
    }

    pub fn is_chat(self) -> bool {
        matches!(self, Self::Chat | Self::ChatThread)
    }

    pub fn is_issue_tracker(self) -> bool {
        matches!(self, Self::IssueList | Self::IssueDetail | Self::IssueTracker)
    }
}

/// Shape a raw payload for `tool_name`.
pub fn shape(tool_name: &str, payload: Value) -> Value {
    let shaped = match ToolFamily::of(tool_name) {
        ToolFamily::FaqSearch => shape_faq(&payload),
        ToolFamily::WikiSearch => shape_wiki(&payload),
        ToolFamily::IssueList => shape_issue_list(&payload),
        ToolFamily::FileSearch => shape_files(&payload),
        ToolFamily::ChatThread => shape_thread(&payload),
        _ => None,
    };
    shaped.unwrap_or_else(|| cap_bare_array(payload))
}

/// First `max` chars of `s`.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// String field truncated, or `null` when absent or not a string.
fn truncated_or_null(item: &Value, key: &str, max: usize) -> Value {
    item.get(key)
        .and_then(Value::as_str)
        .map_or(Value::Null, |s| Value::String(truncate_chars(s, max)))
}

/// String field truncated, or `""` when absent or not a string.
fn truncated_or_empty(item: &Value, key: &str, max: usize) -> Value {
    Value::String(
        item.get(key)
            .and_then(Value::as_str)
            .map(|s| truncate_chars(s, max))
            .unwrap_or_default(),
    )
}

fn field(item: &Value, key: &str) -> Value {
    item.get(key).cloned().unwrap_or(Value::Null)
}

/// Rebuild `payload` as an object with `key` replaced.
fn with_field(payload: &Value, key: &str, value: Value) -> Value {
    let mut object: Map<String, Value> = payload.as_object().cloned().unwrap_or_default();
    object.insert(key.to_string(), value);
    Value::Object(object)
}

fn shape_faq(payload: &Value) -> Option<Value> {
    let matches = payload.get("matches")?.as_array()?;
    let kept: Vec<Value> = matches
        .iter()
        .take(FAQ_MATCHES)
        .map(|m| {
            json!({
                "text": truncated_or_empty(m, "text", FAQ_TEXT_CHARS),
                "context": truncated_or_empty(m, "context", FAQ_CONTEXT_CHARS),
            })
        })
        .collect();
    Some(json!({ "matches": kept, "total": matches.len() }))
}

fn shape_wiki(payload: &Value) -> Option<Value> {
    let pages = payload
        .get("data")
        .and_then(Value::as_array)
        .or_else(|| payload.get("pages").and_then(Value::as_array))?;

    let kept: Vec<Value> = pages
        .iter()
        .take(WIKI_PAGES)
        .map(|page| {
            let inner = page.get("data").unwrap_or(page);
            json!({
                "data": {
                    "_id": field(inner, "_id"),
                    "path": field(inner, "path"),
                    "snippet": truncated_or_null(inner, "snippet", WIKI_SNIPPET_CHARS),
                },
                "meta": field(page, "meta"),
            })
        })
        .collect();

    let mut shaped = with_field(payload, "data", Value::Array(kept));
    if let Some(object) = shaped.as_object_mut() {
        object.remove("pages");
    }
    Some(shaped)
}

fn shape_issue_list(payload: &Value) -> Option<Value> {
    let issues = payload.get("issues")?.as_array()?;
    let kept: Vec<Value> = issues
        .iter()
        .take(ISSUE_LIST_ITEMS)
        .map(|issue| {
            json!({
                "id": field(issue, "id"),
                "subject": field(issue, "subject"),
                "status": field(issue, "status"),
                "description": truncated_or_null(issue, "description", ISSUE_DESCRIPTION_CHARS),
            })
        })
        .collect();
    Some(with_field(payload, "issues", Value::Array(kept)))
}

fn shape_files(payload: &Value) -> Option<Value> {
    let files = payload.get("files")?.as_array()?;
    let kept: Vec<Value> = files.iter().take(DRIVE_FILES).cloned().collect();
    Some(with_field(payload, "files", Value::Array(kept)))
}

fn shape_thread(payload: &Value) -> Option<Value> {
    let messages = payload.get("messages")?.as_array()?;
    let kept: Vec<Value> = messages
        .iter()
        .take(THREAD_MESSAGES)
        .map(|msg| {
            json!({
                "user": field(msg, "user"),
                "text": truncated_or_null(msg, "text", THREAD_TEXT_CHARS),
                "ts": field(msg, "ts"),
                "thread_ts": field(msg, "thread_ts"),
                "type": field(msg, "type"),
            })
        })
        .collect();
    let total = messages.len();
    let shaped = with_field(payload, "messages", Value::Array(kept));
    Some(with_field(&shaped, "total", json!(total)))
}

fn cap_bare_array(payload: Value) -> Value {
    match payload {
        Value::Array(mut items) if items.len() > BARE_ARRAY_ITEMS => {
            tracing::warn!(items = items.len(), limit = BARE_ARRAY_ITEMS, "Truncating array tool result");
            items.truncate(BARE_ARRAY_ITEMS);
            Value::Array(items)
        }
        other => other,
    }
}
