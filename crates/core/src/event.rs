//! Domain event system: observational records of what the agent is doing.
//!
//! Events carry progress and diagnostics (iterations, retries, tool runs,
//! oversized results). They never influence the answer; subscribers are free
//! to ignore them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A loop iteration is about to ask the model
    IterationStarted {
        conversation_id: String,
        iteration: u32,
        max_iterations: u32,
        messages: usize,
        executed_tools: usize,
        timestamp: DateTime<Utc>,
    },

    /// A transient model failure is being retried
    ModelRetry {
        attempt: u32,
        max_attempts: u32,
        wait_ms: u64,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool was executed
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        result_chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// A shaped tool result is still large
    LargeToolResult {
        tool_name: String,
        chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// The model repeated an already executed tool call
    RepetitionDetected {
        conversation_id: String,
        signatures: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// The loop reached a terminal state
    LoopFinished {
        conversation_id: String,
        iterations: u32,
        reason: String,
        answered: bool,
        sources: usize,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Stable snake_case name for logs and streams.
    pub fn name(&self) -> &'static str {
        match self {
            Self::IterationStarted { .. } => "iteration_started",
            Self::ModelRetry { .. } => "model_retry",
            Self::ToolExecuted { .. } => "tool_executed",
            Self::LargeToolResult { .. } => "large_tool_result",
            Self::RepetitionDetected { .. } => "repetition_detected",
            Self::LoopFinished { .. } => "loop_finished",
            Self::ErrorOccurred { .. } => "error_occurred",
        }
    }
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
