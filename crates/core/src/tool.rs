//! Tool back-ends and the registry that exposes them to the model.
//!
//! A back-end is one information source (chat platform, issue tracker, wiki,
//! ...) exposing named functions. The model sees each function as a tool
//! named `<platform>_<function>`; back-end functions take positional
//! arguments.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Call ID (matches the model's tool_use id)
    pub id: String,

    /// Tool name as sent by the model
    pub name: String,

    /// Named input parameters
    pub input: serde_json::Map<String, serde_json::Value>,
}

/// JSON type of a declared parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Integer,
    Object,
}

/// A named parameter a back-end function accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: &'static str,
    pub required: bool,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self { name, kind, description, required: true }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self { name, kind, description, required: false }
    }
}

/// A function a back-end exposes as a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: Vec<ParamSpec>,
}

impl FunctionSpec {
    fn input_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .params
            .iter()
            .map(|p| {
                (
                    p.name.to_string(),
                    serde_json::json!({ "type": p.kind, "description": p.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self.params.iter().filter(|p| p.required).map(|p| p.name).collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// What a back-end returns for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendResponse {
    pub is_success: bool,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub message: String,
}

impl BackendResponse {
    pub fn success(payload: serde_json::Value) -> Self {
        Self { is_success: true, payload, message: String::new() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { is_success: false, payload: serde_json::Value::Null, message: message.into() }
    }
}

/// An external information source.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Platform prefix used in tool names (e.g. "slack", "redmine").
    fn platform(&self) -> &str;

    /// Functions this back-end exposes to the model.
    fn functions(&self) -> Vec<FunctionSpec>;

    /// Data-handling rules the model must follow when using this back-end.
    fn security_rules(&self) -> Vec<String> {
        Vec::new()
    }

    /// Hints about when this back-end is the right source.
    fn usage_context(&self) -> Vec<String> {
        Vec::new()
    }

    /// Invoke `function` with positional arguments.
    async fn invoke(
        &self,
        function: &str,
        args: Vec<serde_json::Value>,
    ) -> std::result::Result<BackendResponse, ToolError>;
}

/// The platform → back-end mapping, fixed once the dispatcher is built.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a back-end under its platform name. Replaces any previous one.
    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.platform().to_string(), backend);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, backend: Arc<dyn Backend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, platform: &str) -> Option<&Arc<dyn Backend>> {
        self.backends.get(platform)
    }

    pub fn platforms(&self) -> Vec<&str> {
        self.backends.keys().map(|s| s.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Tool definitions for every declared function, in platform order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.backends
            .iter()
            .flat_map(|(platform, backend)| {
                backend.functions().into_iter().map(move |f| ToolDefinition {
                    name: format!("{platform}_{}", f.name),
                    description: f.description.to_string(),
                    parameters: f.input_schema(),
                })
            })
            .collect()
    }

    /// Security rules of all back-ends as `(platform, rule)` pairs.
    pub fn security_rules(&self) -> Vec<(String, String)> {
        self.backends
            .iter()
            .flat_map(|(p, b)| b.security_rules().into_iter().map(move |r| (p.clone(), r)))
            .collect()
    }

    /// Usage context of all back-ends as `(platform, line)` pairs.
    pub fn usage_context(&self) -> Vec<(String, String)> {
        self.backends
            .iter()
            .flat_map(|(p, b)| b.usage_context().into_iter().map(move |c| (p.clone(), c)))
            .collect()
    }

    /// Check that every declared parameter can be carried positionally.
    ///
    /// `carried` is the dispatcher's argument ordering. Platform names must
    /// not contain `_`, since tool names split on the first underscore.
    pub fn validate(&self, carried: &[&str]) -> std::result::Result<(), ToolError> {
        let mut problems = Vec::new();
        for (platform, backend) in &self.backends {
            if platform.is_empty() || platform.contains('_') {
                problems.push(format!("platform name '{platform}' must be non-empty and contain no '_'"));
            }
            for function in backend.functions() {
                for param in &function.params {
                    if !carried.contains(&param.name) {
                        problems.push(format!(
                            "{platform}_{} declares parameter '{}' that cannot be passed",
                            function.name, param.name
                        ));
                    }
                }
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ToolError::Registry(problems.join("; ")))
        }
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}
