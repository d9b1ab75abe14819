//! Source collection: the URLs an answer can cite.

use serde_json::{Map, Value};

use crate::shaper::ToolFamily;

const DEFAULT_ISSUE_TRACKER_URL: &str = "https://redmine.example.com";
const ISSUE_LIST_SOURCES: usize = 5;

/// Extracts citable URLs from tool calls.
#[derive(Debug, Clone)]
pub struct SourceCollector {
    issue_base_url: String,
}

impl Default for SourceCollector {
    fn default() -> Self {
        Self::new(DEFAULT_ISSUE_TRACKER_URL)
    }
}

impl SourceCollector {
    pub fn new(issue_base_url: impl Into<String>) -> Self {
        Self {
            issue_base_url: issue_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URLs referenced by one call, from its input and its raw (unshaped) payload.
    pub fn collect(&self, tool_name: &str, input: &Map<String, Value>, payload: &Value) -> Vec<String> {
        let family = ToolFamily::of(tool_name);
        let mut urls = Vec::new();

        if family.is_chat() {
            if let Some(url) = input.get("messageUrl").and_then(id_text) {
                urls.push(url);
            }
            if family == ToolFamily::ChatThread {
                if let Some(url) = payload.get("threadUrl").and_then(id_text) {
                    urls.push(url);
                }
            }
        }

        if family.is_issue_tracker() {
            if family == ToolFamily::IssueDetail {
                if let Some(id) = input.get("issueId").and_then(id_text) {
                    urls.push(self.issue_url(&id));
                }
            }
            if let Some(id) = payload.pointer("/issue/id").and_then(id_text) {
                urls.push(self.issue_url(&id));
            }
            if let Some(issues) = payload.get("issues").and_then(Value::as_array) {
                urls.extend(
                    issues
                        .iter()
                        .take(ISSUE_LIST_SOURCES)
                        .filter_map(|issue| issue.get("id").and_then(id_text))
                        .map(|id| self.issue_url(&id)),
                );
            }
        }

        urls
    }

    fn issue_url(&self, id: &str) -> String {
        format!("{}/issues/{id}", self.issue_base_url)
    }
}

/// A non-empty string or number rendered as text.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Deduplicated source URLs in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceList {
    urls: Vec<String>,
}

impl SourceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add URLs not seen before; returns how many were new.
    pub fn merge(&mut self, urls: impl IntoIterator<Item = String>) -> usize {
        let before = self.urls.len();
        for url in urls {
            if !self.urls.contains(&url) {
                self.urls.push(url);
            }
        }
        self.urls.len() - before
    }

    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.urls
    }
}
