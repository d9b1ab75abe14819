//! Error types for the ThreadScout domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum.

use thiserror::Error;

/// The top-level error type for a question-answering invocation.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model errors (after retry classification) ---
    #[error("Model request rejected: {0}")]
    ModelRejected(String),

    #[error("Model request failed: {0}")]
    ModelFailed(String),

    #[error("Model request still failing after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    // --- Bounded contexts ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures reported by a model client.
///
/// The `Display` text of every variant carries the HTTP status when one is
/// known; [`ProviderError::status_code`] exposes it directly.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider (status: 429): {message}")]
    RateLimited { message: String },

    #[error("Authentication failed (status: {status_code}): {message}")]
    AuthenticationFailed { status_code: u16, message: String },

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// HTTP status of the failed response, when one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { status_code, .. } | Self::AuthenticationFailed { status_code, .. } => Some(*status_code),
            Self::RateLimited { .. } => Some(429),
            Self::NotConfigured(_) | Self::Timeout(_) | Self::Network(_) | Self::InvalidResponse(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid message URL: {0}")]
    InvalidUrl(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Platform API call {method} failed: {reason}")]
    ApiFailed { method: String, reason: String },

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid tool name format: {0}")]
    InvalidToolName(String),

    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Unknown function: {platform}:{function}")]
    UnknownFunction { platform: String, function: String },

    #[error("{0}")]
    BackendFailure(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Back-end request failed: {0}")]
    Transport(String),

    #[error("Back-end registry is inconsistent: {0}")]
    Registry(String),
}
