//! Configuration loading and validation for ThreadScout.
//!
//! Loads configuration from `~/.threadscout/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.threadscout/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider name
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Model API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override for the provider base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response in the tool loop
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Loop bounds and thresholds
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub redmine: RedmineConfig,
}

fn default_provider() -> String {
    "anthropic".into()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

/// Show the first few characters of a secret, for `threadscout check`.
pub fn secret_prefix(secret: &str) -> String {
    let prefix: String = secret.chars().take(8).collect();
    format!("{prefix}...")
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("slack", &self.slack)
            .field("redmine", &self.redmine)
            .finish()
    }
}

/// Bounds of the tool-use loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Total model attempts per logical request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Linear backoff base; the n-th retry waits `n × base`
    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,

    #[serde(default = "default_summary_max_tokens")]
    pub summary_max_tokens: u32,

    /// Shaped results above this many chars are logged as large
    #[serde(default = "default_large_result_warn_chars")]
    pub large_result_warn_chars: usize,
}

fn default_max_iterations() -> u32 {
    10
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_base_delay_secs() -> u64 {
    30
}
fn default_summary_max_tokens() -> u32 {
    4096
}
fn default_large_result_warn_chars() -> usize {
    10_000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_retries: default_max_retries(),
            retry_base_delay_secs: default_retry_base_delay_secs(),
            summary_max_tokens: default_summary_max_tokens(),
            large_result_warn_chars: default_large_result_warn_chars(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Workspace base URL, e.g. `https://acme.slack.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_url: Option<String>,

    /// Web API base URL
    #[serde(default = "default_slack_api_url")]
    pub api_url: String,

    /// User OAuth token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Channel used when a URL carries no channel id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_channel: Option<String>,
}

fn default_slack_api_url() -> String {
    "https://slack.com/api".into()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            workspace_url: None,
            api_url: default_slack_api_url(),
            token: None,
            default_channel: None,
        }
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfig")
            .field("workspace_url", &self.workspace_url)
            .field("api_url", &self.api_url)
            .field("token", &redact(&self.token))
            .field("default_channel", &self.default_channel)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RedmineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl RedmineConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }
}

impl std::fmt::Debug for RedmineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedmineConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.threadscout/config.toml).
    ///
    /// Environment variables override file values:
    /// - `THREADSCOUT_API_KEY`, then `ANTHROPIC_API_KEY` (only when unset in the file)
    /// - `THREADSCOUT_MODEL`
    /// - `SLACK_USER_OAUTH_TOKEN`, `SLACK_BASE_URL`
    /// - `REDMINE_BASE_URL`, `REDMINE_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("THREADSCOUT_API_KEY").or_else(|| lookup("ANTHROPIC_API_KEY"));
        }
        if let Some(model) = lookup("THREADSCOUT_MODEL") {
            self.model = model;
        }
        if let Some(token) = lookup("SLACK_USER_OAUTH_TOKEN") {
            self.slack.token = Some(token);
        }
        if let Some(url) = lookup("SLACK_BASE_URL") {
            self.slack.workspace_url = Some(url);
        }
        if let Some(url) = lookup("REDMINE_BASE_URL") {
            self.redmine.base_url = Some(url);
        }
        if let Some(key) = lookup("REDMINE_API_KEY") {
            self.redmine.api_key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".threadscout")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError("agent.max_iterations must be >= 1".into()));
        }

        if self.agent.max_retries == 0 {
            return Err(ConfigError::ValidationError("agent.max_retries must be >= 1".into()));
        }

        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            slack: SlackConfig::default(),
            redmine: RedmineConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
