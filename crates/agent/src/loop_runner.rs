//! The answer loop: ask the model, run the tools it requests, feed results
//! back, and stop on a final answer, a repeated call, or the iteration limit.

use std::sync::Arc;
use std::time::Instant;

use threadscout_core::channel::ThreadContext;
use threadscout_core::event::{DomainEvent, EventBus};
use threadscout_core::message::{ContentBlock, Conversation, Message};
use threadscout_core::provider::{Provider, ProviderRequest, StopReason, ToolDefinition};
use threadscout_core::tool::ToolInvocation;
use threadscout_tools::{SourceCollector, SourceList, ToolDispatcher, shape};
use tracing::{debug, info, warn};

use crate::guard::{RepetitionGuard, Verdict};
use crate::prompt::{self, REPETITION_NOTICE, SKIPPED_CALL_RESULT, SYSTEM_PROMPT};
use crate::retry::RequestRetrier;

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;
pub const DEFAULT_LARGE_RESULT_CHARS: usize = 10_000;

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The model ended its turn without requesting tools.
    EndTurn,
    /// The model repeated an executed tool call.
    Repetition,
    /// `max_iterations` model calls were made.
    IterationLimit,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndTurn => write!(f, "end_turn"),
            Self::Repetition => write!(f, "repetition"),
            Self::IterationLimit => write!(f, "iteration_limit"),
        }
    }
}

/// Result of one loop run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// Last non-empty text the model produced outside a tool-use turn.
    pub answer: Option<String>,
    /// Deduplicated citable URLs in first-seen order.
    pub sources: Vec<String>,
    pub iterations: u32,
    pub termination: Termination,
    /// Full history, used to summarize when no answer was produced.
    pub conversation: Conversation,
}

/// Drives the model/tool conversation for one question.
pub struct AnswerLoop {
    provider: Arc<dyn Provider>,
    dispatcher: Arc<ToolDispatcher>,
    retrier: RequestRetrier,
    collector: SourceCollector,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: u32,
    large_result_chars: usize,
    event_bus: Arc<EventBus>,
}

impl AnswerLoop {
    pub fn new(provider: Arc<dyn Provider>, dispatcher: Arc<ToolDispatcher>, model: impl Into<String>) -> Self {
        Self {
            provider,
            dispatcher,
            retrier: RequestRetrier::default(),
            collector: SourceCollector::default(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            large_result_chars: DEFAULT_LARGE_RESULT_CHARS,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    pub fn with_retrier(mut self, retrier: RequestRetrier) -> Self {
        self.retrier = retrier;
        self
    }

    /// Set where issue-tracker source URLs point.
    pub fn with_source_collector(mut self, collector: SourceCollector) -> Self {
        self.collector = collector;
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Shaped results longer than this are logged as oversized.
    pub fn with_large_result_chars(mut self, chars: usize) -> Self {
        self.large_result_chars = chars;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = bus;
        self
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Tool definitions of every registered back-end.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.dispatcher.registry().definitions()
    }

    /// Run the loop for `context`, offering `tools` to the model.
    pub async fn run(
        &self,
        context: &ThreadContext,
        tools: &[ToolDefinition],
    ) -> Result<LoopOutcome, threadscout_core::Error> {
        let mut conversation = Conversation::new();
        conversation.push(Message::user(prompt::initial_prompt(context, self.dispatcher.registry())));

        let mut guard = RepetitionGuard::new();
        let mut sources = SourceList::new();
        let mut answer = None;
        let mut iterations = 0;
        let mut termination = Termination::IterationLimit;

        info!(
            conversation_id = %conversation.id,
            tools = tools.len(),
            max_iterations = self.max_iterations,
            "Starting answer loop"
        );

        while iterations < self.max_iterations {
            iterations += 1;
            info!(
                conversation_id = %conversation.id,
                iteration = iterations,
                max_iterations = self.max_iterations,
                messages = conversation.len(),
                executed_tools = guard.len(),
                "Loop iteration"
            );
            self.event_bus.publish(DomainEvent::IterationStarted {
                conversation_id: conversation.id.to_string(),
                iteration: iterations,
                max_iterations: self.max_iterations,
                messages: conversation.len(),
                executed_tools: guard.len(),
                timestamp: chrono::Utc::now(),
            });

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: conversation.messages.clone(),
                system: Some(SYSTEM_PROMPT.to_string()),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: tools.to_vec(),
            };

            let response = match self.retrier.call(self.provider.as_ref(), &request).await {
                Ok(response) => response,
                Err(e) => {
                    self.event_bus.publish(DomainEvent::ErrorOccurred {
                        context: format!("answer loop iteration {iterations}"),
                        error_message: e.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                    return Err(e);
                }
            };

            let invocations = response.tool_invocations();
            let text = response.text();
            let stop_reason = response.stop_reason.clone();
            debug!(
                stop_reason = %stop_reason,
                tool_calls = invocations.len(),
                text_chars = text.chars().count(),
                "Model responded"
            );
            // The API rejects assistant turns without content
            if response.message.has_content() {
                conversation.push(response.message);
            } else {
                debug!(conversation_id = %conversation.id, "Dropping empty assistant turn");
            }

            if !invocations.is_empty() {
                if let Verdict::Repeated(signatures) = guard.check(&invocations) {
                    warn!(
                        conversation_id = %conversation.id,
                        repeated = signatures.len(),
                        "Model repeated an executed tool call, stopping"
                    );
                    self.event_bus.publish(DomainEvent::RepetitionDetected {
                        conversation_id: conversation.id.to_string(),
                        signatures: signatures.iter().map(ToString::to_string).collect(),
                        timestamp: chrono::Utc::now(),
                    });
                    conversation.push(repetition_turn(&invocations));
                    termination = Termination::Repetition;
                    break;
                }

                let results = self.execute_batch(&invocations, &mut sources).await;
                conversation.push(Message::tool_results(results));
                continue;
            }

            if !text.is_empty() {
                answer = Some(text);
            }
            if stop_reason == StopReason::EndTurn {
                termination = Termination::EndTurn;
                break;
            }
        }

        if termination == Termination::IterationLimit {
            warn!(
                conversation_id = %conversation.id,
                iterations,
                "Iteration limit reached"
            );
        }
        info!(
            conversation_id = %conversation.id,
            iterations,
            termination = %termination,
            answered = answer.is_some(),
            sources = sources.len(),
            "Answer loop finished"
        );
        self.event_bus.publish(DomainEvent::LoopFinished {
            conversation_id: conversation.id.to_string(),
            iterations,
            reason: termination.to_string(),
            answered: answer.is_some(),
            sources: sources.len(),
            timestamp: chrono::Utc::now(),
        });

        Ok(LoopOutcome {
            answer,
            sources: sources.into_vec(),
            iterations,
            termination,
            conversation,
        })
    }

    /// Execute one batch in order; failures become error results.
    async fn execute_batch(&self, invocations: &[ToolInvocation], sources: &mut SourceList) -> Vec<ContentBlock> {
        let mut results = Vec::with_capacity(invocations.len());

        for call in invocations {
            let start = Instant::now();
            let outcome = self.dispatcher.execute(&call.name, &call.input).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let block = match outcome {
                Ok(payload) => {
                    let added = sources.merge(self.collector.collect(&call.name, &call.input, &payload));
                    let content = serde_json::to_string_pretty(&shape(&call.name, payload)).unwrap_or_default();
                    let chars = content.chars().count();

                    info!(tool = %call.name, duration_ms, result_chars = chars, new_sources = added, "Tool executed");
                    if chars > self.large_result_chars {
                        warn!(tool = %call.name, chars, "Tool result is still large after shaping");
                        self.event_bus.publish(DomainEvent::LargeToolResult {
                            tool_name: call.name.clone(),
                            chars,
                            timestamp: chrono::Utc::now(),
                        });
                    }
                    self.event_bus.publish(DomainEvent::ToolExecuted {
                        tool_name: call.name.clone(),
                        success: true,
                        duration_ms,
                        result_chars: chars,
                        timestamp: chrono::Utc::now(),
                    });

                    ContentBlock::ToolResult {
                        tool_use_id: call.id.clone(),
                        content,
                        is_error: false,
                    }
                }
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Tool execution failed");
                    let content = format!("Error: {e}");
                    self.event_bus.publish(DomainEvent::ToolExecuted {
                        tool_name: call.name.clone(),
                        success: false,
                        duration_ms,
                        result_chars: content.chars().count(),
                        timestamp: chrono::Utc::now(),
                    });

                    // Reported back so the model can recover
                    ContentBlock::ToolResult {
                        tool_use_id: call.id.clone(),
                        content,
                        is_error: true,
                    }
                }
            };
            results.push(block);
        }

        results
    }
}

/// Every tool_use needs a tool_result in the next turn, so the skipped
/// batch is answered with error results ahead of the notice.
fn repetition_turn(invocations: &[ToolInvocation]) -> Message {
    let mut blocks: Vec<ContentBlock> = invocations
        .iter()
        .map(|call| ContentBlock::ToolResult {
            tool_use_id: call.id.clone(),
            content: SKIPPED_CALL_RESULT.to_string(),
            is_error: true,
        })
        .collect();
    blocks.push(ContentBlock::Text {
        text: REPETITION_NOTICE.to_string(),
    });
    Message::tool_results(blocks)
}
