//! Slack back-end: permalink parsing, a thin Web API client, and the tool
//! functions exposed to the model.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::sync::LazyLock;
use threadscout_core::error::ToolError;
use threadscout_core::tool::{Backend, BackendResponse, FunctionSpec, ParamKind, ParamSpec};
use tracing::debug;

use super::{expect_object, expect_str, query_pairs};

static ARCHIVE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/archives/([A-Z0-9]+)/p(\d+)").expect("valid regex"));

static THREAD_TS_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"thread_ts=(\d+\.\d+)").expect("valid regex"));

static PERMALINK_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<?(https://[^/\s]+\.slack\.com/archives/[A-Z0-9]+/p\d+)>?").expect("valid regex")
});

/// A parsed Slack message permalink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permalink {
    pub channel: String,
    /// Message timestamp, `seconds.micros`
    pub ts: String,
    /// Parent timestamp when the link points into a thread
    pub thread_ts: Option<String>,
}

impl Permalink {
    /// Parse `https://<ws>.slack.com/archives/<CHANNEL>/p<digits>[?thread_ts=..]`.
    pub fn parse(url: &str) -> Option<Self> {
        let path = url.split('?').next().unwrap_or(url);
        let captures = ARCHIVE_PATH.captures(path)?;
        let channel = captures.get(1)?.as_str().to_string();
        let digits = captures.get(2)?.as_str();
        if digits.len() <= 10 {
            return None;
        }
        let (secs, micros) = digits.split_at(10);

        let thread_ts = THREAD_TS_PARAM
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        Some(Self {
            channel,
            ts: format!("{secs}.{micros}"),
            thread_ts,
        })
    }

    /// First message permalink mentioned in `text`, without surrounding `<>`.
    pub fn find_in(text: &str) -> Option<&str> {
        PERMALINK_IN_TEXT
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }

    /// Channel id from an `/archives/<ID>/` URL.
    pub fn channel_of(url: &str) -> Option<String> {
        ARCHIVE_PATH
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Build the permalink of `ts` in `channel` under `workspace_url`.
    pub fn url(workspace_url: &str, channel: &str, ts: &str) -> String {
        format!(
            "{}/archives/{channel}/p{}",
            workspace_url.trim_end_matches('/'),
            ts.replace('.', "")
        )
    }

    /// `https://<ws>.slack.com` part of a permalink.
    pub fn workspace_of(url: &str) -> Option<&str> {
        url.find("/archives/").map(|i| &url[..i])
    }
}

/// Slack Web API failures.
#[derive(Debug, thiserror::Error)]
pub enum SlackApiError {
    #[error("Slack request {method} failed: {reason}")]
    Http { method: String, reason: String },

    #[error("Slack API {method} returned error: {error}")]
    Api { method: String, error: String },
}

impl From<SlackApiError> for ToolError {
    fn from(e: SlackApiError) -> Self {
        match e {
            SlackApiError::Http { .. } => ToolError::Transport(e.to_string()),
            SlackApiError::Api { .. } => ToolError::BackendFailure(e.to_string()),
        }
    }
}

/// Minimal Slack Web API client authenticated with a user OAuth token.
#[derive(Clone)]
pub struct SlackApi {
    api_url: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for SlackApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackApi")
            .field("api_url", &self.api_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl SlackApi {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    /// GET a Web API method; fails when Slack answers `ok: false`.
    pub async fn get(&self, method: &str, params: &[(String, String)]) -> Result<Value, SlackApiError> {
        debug!(method, "Calling Slack API");
        let response = self
            .client
            .get(format!("{}/{method}", self.api_url))
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await
            .map_err(|e| http_error(method, e))?;
        Self::check(method, response).await
    }

    /// POST a JSON body to a Web API method.
    pub async fn post(&self, method: &str, body: &Value) -> Result<Value, SlackApiError> {
        debug!(method, "Calling Slack API");
        let response = self
            .client
            .post(format!("{}/{method}", self.api_url))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| http_error(method, e))?;
        Self::check(method, response).await
    }

    async fn check(method: &str, response: reqwest::Response) -> Result<Value, SlackApiError> {
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| http_error(method, e))?;
        if !status.is_success() || body.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("status {}", status.as_u16()));
            return Err(SlackApiError::Api {
                method: method.to_string(),
                error,
            });
        }
        Ok(body)
    }

    /// `conversations.history` with extra filter params.
    pub async fn history(&self, channel: &str, filters: &[(String, String)]) -> Result<Vec<Value>, SlackApiError> {
        let mut params = vec![("channel".to_string(), channel.to_string())];
        params.extend_from_slice(filters);
        let body = self.get("conversations.history", &params).await?;
        Ok(messages_of(&body))
    }

    /// `conversations.replies` of the thread rooted at `ts`.
    pub async fn replies(&self, channel: &str, ts: &str) -> Result<Vec<Value>, SlackApiError> {
        let params = [
            ("channel".to_string(), channel.to_string()),
            ("ts".to_string(), ts.to_string()),
        ];
        let body = self.get("conversations.replies", &params).await?;
        Ok(messages_of(&body))
    }

    /// `search.messages`; returns the matches.
    pub async fn search(&self, query: &str) -> Result<Value, SlackApiError> {
        let body = self
            .get("search.messages", &[("query".to_string(), query.to_string())])
            .await?;
        Ok(body.get("messages").cloned().unwrap_or(Value::Null))
    }

    /// `chat.postMessage`, optionally as a thread reply.
    pub async fn post_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> Result<(), SlackApiError> {
        let mut body = json!({ "channel": channel, "text": text });
        if let Some(ts) = thread_ts {
            body["thread_ts"] = json!(ts);
        }
        self.post("chat.postMessage", &body).await.map(|_| ())
    }
}

fn http_error(method: &str, e: reqwest::Error) -> SlackApiError {
    SlackApiError::Http {
        method: method.to_string(),
        reason: e.to_string(),
    }
}

fn messages_of(body: &Value) -> Vec<Value> {
    body.get("messages")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Slack exposed to the model as `slack_*` tools.
#[derive(Debug, Clone)]
pub struct SlackBackend {
    api: SlackApi,
    workspace_url: Option<String>,
}

impl SlackBackend {
    pub fn new(api: SlackApi) -> Self {
        Self { api, workspace_url: None }
    }

    /// Workspace URL used to build thread permalinks.
    pub fn with_workspace_url(mut self, url: impl Into<String>) -> Self {
        self.workspace_url = Some(url.into());
        self
    }

    async fn thread_messages(&self, message_url: &str) -> Result<BackendResponse, ToolError> {
        let Some(link) = Permalink::parse(message_url) else {
            return Ok(BackendResponse::failure(format!(
                "Invalid Slack message URL format: {message_url}"
            )));
        };
        let root = link.thread_ts.as_deref().unwrap_or(&link.ts);
        let messages = self.api.replies(&link.channel, root).await?;

        let workspace = self
            .workspace_url
            .as_deref()
            .or_else(|| Permalink::workspace_of(message_url))
            .unwrap_or_default();

        Ok(BackendResponse::success(json!({
            "channel": link.channel,
            "messages": messages,
            "threadUrl": Permalink::url(workspace, &link.channel, root),
        })))
    }

    async fn search_messages(&self, query: &str) -> Result<BackendResponse, ToolError> {
        let found = self.api.search(query).await?;
        Ok(BackendResponse::success(json!({
            "matches": found.get("matches").cloned().unwrap_or_else(|| json!([])),
            "total": found.get("total").cloned().unwrap_or(Value::Null),
        })))
    }

    async fn conversation_history(
        &self,
        channel: &str,
        filters: Option<&Map<String, Value>>,
    ) -> Result<BackendResponse, ToolError> {
        let messages = self.api.history(channel, &query_pairs(filters)).await?;
        Ok(BackendResponse::success(json!({ "messages": messages })))
    }
}

#[async_trait]
impl Backend for SlackBackend {
    fn platform(&self) -> &str {
        "slack"
    }

    fn functions(&self) -> Vec<FunctionSpec> {
        vec![
            FunctionSpec {
                name: "getThreadMessages",
                description: "Fetch every message of the Slack thread a message permalink points into.",
                params: vec![ParamSpec::required(
                    "messageUrl",
                    ParamKind::String,
                    "Slack message permalink, e.g. https://<workspace>.slack.com/archives/C0123/p1700000000000100",
                )],
            },
            FunctionSpec {
                name: "searchMessages",
                description: "Search past Slack conversations with Slack search syntax.",
                params: vec![ParamSpec::required("query", ParamKind::String, "Search query")],
            },
            FunctionSpec {
                name: "getConversationHistory",
                description: "List recent messages of a Slack channel.",
                params: vec![
                    ParamSpec::required("channel", ParamKind::String, "Channel id, e.g. C0123ABCD"),
                    ParamSpec::optional(
                        "queryParams",
                        ParamKind::String,
                        "Extra filters as key=value&key=value (latest, oldest, limit)",
                    ),
                ],
            },
        ]
    }

    fn security_rules(&self) -> Vec<String> {
        vec!["Do not quote direct messages or private channel content beyond what the answer needs.".into()]
    }

    fn usage_context(&self) -> Vec<String> {
        vec!["Past discussions, incident reports and decisions made in chat.".into()]
    }

    async fn invoke(&self, function: &str, args: Vec<Value>) -> Result<BackendResponse, ToolError> {
        match function {
            "getThreadMessages" => self.thread_messages(expect_str(&args, 0, "messageUrl")?).await,
            "searchMessages" => self.search_messages(expect_str(&args, 0, "query")?).await,
            "getConversationHistory" => {
                let channel = expect_str(&args, 0, "channel")?;
                let filters = expect_object(&args, 1, "queryParams")?;
                self.conversation_history(channel, filters).await
            }
            other => Err(ToolError::UnknownFunction {
                platform: "slack".into(),
                function: other.into(),
            }),
        }
    }
}
