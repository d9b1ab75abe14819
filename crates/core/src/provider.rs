//! Provider trait: the abstraction over the language model.
//!
//! A Provider sends a conversation (plus optional tool definitions) to a model
//! and returns the assistant's turn together with the reason it stopped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::ToolInvocation;

/// A single model request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,

    /// The conversation messages
    pub messages: Vec<Message>,

    /// System prompt, sent out-of-band from the messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Available tools. Empty means tool use is disabled for this request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            system: None,
            temperature: default_temperature(),
            max_tokens: None,
            tools: Vec::new(),
        }
    }
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name (`<platform>_<function>`)
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Normal completion: the turn is a final answer
    EndTurn,
    /// The model asks for tool execution
    ToolUse,
    /// Output budget exhausted
    MaxTokens,
    /// Anything else the provider reported
    Other(String),
}

impl StopReason {
    /// Map a wire-level stop reason string.
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            None | Some("end_turn") | Some("stop") | Some("stop_sequence") => Self::EndTurn,
            Some("tool_use") | Some("tool-calls") | Some("tool_calls") => Self::ToolUse,
            Some("max_tokens") | Some("length") => Self::MaxTokens,
            Some(other) => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndTurn => write!(f, "end_turn"),
            Self::ToolUse => write!(f, "tool_use"),
            Self::MaxTokens => write!(f, "max_tokens"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A complete response from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The assistant turn, content kept as raw blocks
    pub message: Message,

    /// Why generation stopped
    pub stop_reason: StopReason,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

impl ProviderResponse {
    /// Text of the assistant turn.
    pub fn text(&self) -> String {
        self.message.text()
    }

    /// Tool calls requested in this turn.
    pub fn tool_invocations(&self) -> Vec<ToolInvocation> {
        self.message.tool_invocations()
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Provider trait.
///
/// The agent loop calls `complete()` without knowing which backend is
/// behind it. Failures are reported as [`ProviderError`]; their display text
/// is what the retry layer classifies.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;
}
