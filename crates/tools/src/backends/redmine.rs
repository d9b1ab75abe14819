//! Redmine issue tracker back-end.

use async_trait::async_trait;
use serde_json::{Map, Value};
use threadscout_core::error::ToolError;
use threadscout_core::tool::{Backend, BackendResponse, FunctionSpec, ParamKind, ParamSpec};
use tracing::debug;

use super::{expect_object, expect_str, query_pairs};

/// Redmine REST API exposed to the model as `redmine_*` tools.
#[derive(Clone)]
pub struct RedmineBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for RedmineBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedmineBackend")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl RedmineBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn issue_path(issue_id: &str) -> Result<String, ToolError> {
        let id = issue_id.trim().trim_start_matches('#');
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ToolError::InvalidArguments(format!("'issueId' must be numeric, got '{issue_id}'")));
        }
        Ok(format!("issues/{id}.json"))
    }

    async fn get_json(&self, path: &str, params: &[(String, String)]) -> Result<BackendResponse, ToolError> {
        let url = format!("{}/{path}", self.base_url);
        debug!(url = %url, "Calling Redmine API");

        let response = self
            .client
            .get(&url)
            .header("X-Redmine-API-Key", &self.api_key)
            .query(params)
            .send()
            .await
            .map_err(|e| ToolError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(BackendResponse::failure(format!(
                "Redmine request {path} failed with status {}",
                status.as_u16()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ToolError::Transport(format!("Invalid Redmine response: {e}")))?;
        Ok(BackendResponse::success(payload))
    }

    async fn get_issue(&self, issue_id: &str) -> Result<BackendResponse, ToolError> {
        let path = Self::issue_path(issue_id)?;
        self.get_json(&path, &[("include".to_string(), "journals".to_string())])
            .await
    }

    async fn get_issues(&self, filters: Option<&Map<String, Value>>) -> Result<BackendResponse, ToolError> {
        self.get_json("issues.json", &query_pairs(filters)).await
    }
}

#[async_trait]
impl Backend for RedmineBackend {
    fn platform(&self) -> &str {
        "redmine"
    }

    fn functions(&self) -> Vec<FunctionSpec> {
        vec![
            FunctionSpec {
                name: "getIssue",
                description: "Fetch one Redmine issue with its description and journal notes.",
                params: vec![ParamSpec::required("issueId", ParamKind::String, "Numeric issue id, e.g. 12345")],
            },
            FunctionSpec {
                name: "getIssues",
                description: "List Redmine issues matching filters.",
                params: vec![ParamSpec::optional(
                    "queryParams",
                    ParamKind::String,
                    "Filters as key=value&key=value, e.g. project_id=app&status_id=open&subject=~timeout&limit=20",
                )],
            },
        ]
    }

    fn security_rules(&self) -> Vec<String> {
        vec!["Do not reveal personal information (names, email addresses, phone numbers) found in issues.".into()]
    }

    fn usage_context(&self) -> Vec<String> {
        vec!["Related tickets, past inquiries, bug reports and their resolutions.".into()]
    }

    async fn invoke(&self, function: &str, args: Vec<Value>) -> Result<BackendResponse, ToolError> {
        match function {
            "getIssue" => {
                let id = match args.first() {
                    Some(Value::Number(n)) => n.to_string(),
                    _ => expect_str(&args, 0, "issueId")?.to_string(),
                };
                self.get_issue(&id).await
            }
            "getIssues" => self.get_issues(expect_object(&args, 0, "queryParams")?).await,
            other => Err(ToolError::UnknownFunction {
                platform: "redmine".into(),
                function: other.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn issue_path_accepts_hash_prefix() {
        assert_eq!(RedmineBackend::issue_path("#123").unwrap(), "issues/123.json");
        assert_eq!(RedmineBackend::issue_path(" 42 ").unwrap(), "issues/42.json");
        assert!(RedmineBackend::issue_path("../projects").is_err());
        assert!(RedmineBackend::issue_path("").is_err());
    }

    #[test]
    fn metadata_and_redaction() {
        let backend = RedmineBackend::new("https://redmine.local/", "rm-secret");
        assert_eq!(backend.base_url(), "https://redmine.local");
        assert_eq!(backend.platform(), "redmine");
        assert_eq!(backend.security_rules().len(), 1);
        assert!(!format!("{backend:?}").contains("rm-secret"));
    }

    #[tokio::test]
    async fn non_string_issue_id_rejected_before_request() {
        let backend = RedmineBackend::new("http://127.0.0.1:9", "k");
        let err = backend.invoke("getIssue", vec![json!({"id": 1})]).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn unknown_function_rejected() {
        let backend = RedmineBackend::new("http://127.0.0.1:9", "k");
        let err = backend.invoke("deleteIssue", vec![]).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownFunction { .. }));
    }
}
