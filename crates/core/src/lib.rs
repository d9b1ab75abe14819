//! # ThreadScout Core
//!
//! Domain types, traits, and error definitions for the ThreadScout
//! question-answering agent. This crate has **no framework dependencies**:
//! it defines the model that the provider, tool, channel and agent crates
//! implement against.
//!
//! ## Layout
//!
//! - [`message`]: conversation turns and their content blocks
//! - [`provider`]: the language-model boundary
//! - [`tool`]: tool invocations and the back-end registry
//! - [`channel`]: thread ingestion and answer delivery
//! - [`event`]: observational domain events

pub mod channel;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use channel::{AnswerSink, ThreadContext, ThreadMessage, ThreadSource};
pub use error::{ChannelError, Error, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{ContentBlock, Conversation, ConversationId, Message, MessageContent, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StopReason, ToolDefinition, Usage};
pub use tool::{
    Backend, BackendRegistry, BackendResponse, FunctionSpec, ParamKind, ParamSpec, ToolInvocation,
};
