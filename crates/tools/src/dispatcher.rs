//! Tool dispatch: routes a model tool call to the owning back-end.
//!
//! Tool names follow `<platform>_<function>`. Back-end functions take
//! positional arguments, so named model input is flattened through a single
//! fixed parameter ordering.

use serde_json::{Map, Value};
use std::sync::Arc;
use threadscout_core::error::ToolError;
use threadscout_core::tool::{Backend, BackendRegistry};
use tracing::{debug, warn};

/// Every parameter name a back-end can receive, in positional order.
pub const ARG_ORDER: &[&str] = &[
    "issueId",
    "queryId",
    "documentId",
    "fileId",
    "pageId",
    "channel",
    "text",
    "searchQuery",
    "query",
    "messageUrl",
    "env",
    "sql",
    "apiPath",
    "queryParams",
    "options",
    "iconEmoji",
    "ref",
];

/// Executes tool calls against a fixed back-end registry.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: BackendRegistry,
}

impl ToolDispatcher {
    /// Build a dispatcher, rejecting registries that declare parameters the
    /// positional ordering cannot carry.
    pub fn new(registry: BackendRegistry) -> Result<Self, ToolError> {
        registry.validate(ARG_ORDER)?;
        Ok(Self { registry })
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Execute `tool_name` with the model's named `input`, returning the raw payload.
    pub async fn execute(&self, tool_name: &str, input: &Map<String, Value>) -> Result<Value, ToolError> {
        let (platform, function) = split_tool_name(tool_name)?;
        let backend = self.resolve(platform, function)?;

        let args = positional_args(tool_name, input);
        debug!(tool = %tool_name, args = args.len(), "Dispatching tool call");

        let response = backend.invoke(function, args).await?;
        if !response.is_success {
            return Err(ToolError::BackendFailure(response.message));
        }
        Ok(response.payload)
    }

    fn resolve(&self, platform: &str, function: &str) -> Result<&Arc<dyn Backend>, ToolError> {
        let backend = self
            .registry
            .get(platform)
            .ok_or_else(|| ToolError::UnknownPlatform(platform.to_string()))?;

        if !backend.functions().iter().any(|f| f.name == function) {
            return Err(ToolError::UnknownFunction {
                platform: platform.to_string(),
                function: function.to_string(),
            });
        }
        Ok(backend)
    }
}

/// Split on the first underscore; the function part keeps any further ones.
pub fn split_tool_name(tool_name: &str) -> Result<(&str, &str), ToolError> {
    match tool_name.split_once('_') {
        Some((platform, function)) if !platform.is_empty() && !function.is_empty() => {
            Ok((platform, function))
        }
        _ => Err(ToolError::InvalidToolName(tool_name.to_string())),
    }
}

/// Flatten named input into the positional argument list.
fn positional_args(tool_name: &str, input: &Map<String, Value>) -> Vec<Value> {
    let dropped: Vec<&str> = input
        .keys()
        .map(String::as_str)
        .filter(|k| !ARG_ORDER.contains(k))
        .collect();
    if !dropped.is_empty() {
        warn!(tool = %tool_name, dropped = ?dropped, "Ignoring parameters outside the argument ordering");
    }

    ARG_ORDER
        .iter()
        .filter_map(|key| {
            input.get(*key).map(|value| match (*key, value) {
                ("queryParams", Value::String(raw)) => Value::Object(parse_query_params(raw)),
                _ => value.clone(),
            })
        })
        .collect()
}

/// Parse `k1=v1&k2=v2` into an object; pairs missing a key or value are skipped.
pub fn parse_query_params(raw: &str) -> Map<String, Value> {
    raw.split('&')
        .filter_map(|pair| {
            let mut parts = pair.split('=');
            let key = parts.next().filter(|k| !k.is_empty())?;
            let value = parts.next().filter(|v| !v.is_empty())?;
            Some((key.to_string(), Value::String(value.to_string())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use threadscout_core::tool::{BackendResponse, FunctionSpec, ParamKind, ParamSpec};

    /// Records the positional arguments of every call.
    #[derive(Default)]
    struct RecordingBackend {
        calls: Mutex<Vec<(String, Vec<Value>)>>,
    }

    #[async_trait]
    impl Backend for RecordingBackend {
        fn platform(&self) -> &str {
            "redmine"
        }

        fn functions(&self) -> Vec<FunctionSpec> {
            vec![
                FunctionSpec {
                    name: "getIssue",
                    description: "Fetch one issue",
                    params: vec![ParamSpec::required("issueId", ParamKind::String, "Issue id")],
                },
                FunctionSpec {
                    name: "getIssues",
                    description: "List issues",
                    params: vec![ParamSpec::optional("queryParams", ParamKind::Object, "Filters")],
                },
                FunctionSpec {
                    name: "get_time_entries",
                    description: "Underscored function name",
                    params: vec![],
                },
                FunctionSpec {
                    name: "failing",
                    description: "Always reports failure",
                    params: vec![],
                },
            ]
        }

        async fn invoke(&self, function: &str, args: Vec<Value>) -> Result<BackendResponse, ToolError> {
            self.calls.lock().unwrap().push((function.to_string(), args.clone()));
            if function == "failing" {
                return Ok(BackendResponse::failure("issue tracker unavailable"));
            }
            Ok(BackendResponse::success(json!({ "args": args })))
        }
    }

    fn dispatcher() -> (ToolDispatcher, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::default());
        let registry = BackendRegistry::new().with(backend.clone());
        (ToolDispatcher::new(registry).unwrap(), backend)
    }

    fn input(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn split_keeps_remainder_whole() {
        assert_eq!(split_tool_name("redmine_getIssue").unwrap(), ("redmine", "getIssue"));
        assert_eq!(
            split_tool_name("redmine_get_time_entries").unwrap(),
            ("redmine", "get_time_entries")
        );
        assert!(matches!(split_tool_name("search"), Err(ToolError::InvalidToolName(_))));
        assert!(split_tool_name("_search").is_err());
        assert!(split_tool_name("slack_").is_err());
    }

    #[test]
    fn query_params_string_is_parsed() {
        let parsed = parse_query_params("status_id=1&limit=10&=orphan&empty=&flag");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["status_id"], "1");
        assert_eq!(parsed["limit"], "10");
    }

    #[test]
    fn positional_order_follows_fixed_ordering() {
        let args = positional_args(
            "x_y",
            &input(json!({"query": "q", "issueId": "7", "unknown": 1, "ref": "main"})),
        );
        assert_eq!(args, vec![json!("7"), json!("q"), json!("main")]);
    }

    #[tokio::test]
    async fn executes_with_positional_args() {
        let (dispatcher, backend) = dispatcher();
        let payload = dispatcher
            .execute("redmine_getIssue", &input(json!({"issueId": "123"})))
            .await
            .unwrap();

        assert_eq!(payload["args"], json!(["123"]));
        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].0, "getIssue");
    }

    #[tokio::test]
    async fn query_params_reach_backend_as_object() {
        let (dispatcher, backend) = dispatcher();
        dispatcher
            .execute("redmine_getIssues", &input(json!({"queryParams": "status_id=1&limit=10"})))
            .await
            .unwrap();

        let calls = backend.calls.lock().unwrap();
        assert_eq!(calls[0].1, vec![json!({"status_id": "1", "limit": "10"})]);
    }

    #[tokio::test]
    async fn underscored_function_is_routed() {
        let (dispatcher, backend) = dispatcher();
        dispatcher
            .execute("redmine_get_time_entries", &Map::new())
            .await
            .unwrap();
        assert_eq!(backend.calls.lock().unwrap()[0].0, "get_time_entries");
    }

    #[tokio::test]
    async fn unknown_platform_and_function() {
        let (dispatcher, backend) = dispatcher();

        let err = dispatcher.execute("jira_getIssue", &Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::UnknownPlatform(ref p) if p == "jira"));

        let err = dispatcher.execute("redmine_deleteIssue", &Map::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown function: redmine:deleteIssue");

        assert!(backend.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_carries_message() {
        let (dispatcher, _) = dispatcher();
        let err = dispatcher.execute("redmine_failing", &Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::BackendFailure(_)));
        assert_eq!(err.to_string(), "issue tracker unavailable");
    }

    struct UncarriedBackend;

    #[async_trait]
    impl Backend for UncarriedBackend {
        fn platform(&self) -> &str {
            "wiki"
        }

        fn functions(&self) -> Vec<FunctionSpec> {
            vec![FunctionSpec {
                name: "search",
                description: "Search pages",
                params: vec![ParamSpec::required("keyword", ParamKind::String, "Search term")],
            }]
        }

        async fn invoke(&self, _: &str, _: Vec<Value>) -> Result<BackendResponse, ToolError> {
            Ok(BackendResponse::success(Value::Null))
        }
    }

    #[test]
    fn registry_with_uncarried_param_is_rejected() {
        let registry = BackendRegistry::new().with(Arc::new(UncarriedBackend));
        let err = ToolDispatcher::new(registry).unwrap_err();
        assert!(matches!(err, ToolError::Registry(_)));
        assert!(err.to_string().contains("keyword"));
    }
}
